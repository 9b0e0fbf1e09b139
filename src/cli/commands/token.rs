use chrono::{TimeZone, Utc};
use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::{utils::output_success, OutputFormat};
use crate::config;

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(help = "Username recorded as the token subject")]
    pub username: String,

    #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let hours = args.hours.unwrap_or(security.jwt_expiry_hours);

    let claims = Claims::new(args.username, hours);
    let token = generate_jwt(&claims, &security.jwt_secret)?;
    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .map(|at| at.to_rfc3339());

    match output_format {
        // Bare token so the text form can be captured by shell scripts
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({ "token": token, "subject": claims.sub, "expires_at": expires_at })),
        ),
    }
}
