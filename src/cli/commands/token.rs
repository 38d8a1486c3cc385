use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_value;
use crate::cli::OutputFormat;

pub fn handle(
    user_id: String,
    user_type: Option<String>,
    email: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let claims = Claims::new(user_id, email, user_type);
    let token = generate_jwt(&claims)?;

    match output_format {
        OutputFormat::Json => output_value(
            &output_format,
            &serde_json::json!({ "token": token, "expires_at": claims.exp, "claims": claims }),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
