//! OAUTHBEARER demo - concurrent in-process handshakes
//!
//! Without `--config`, the demo is self-contained: it mints HS256 tokens
//! with `--secret` and validates them against the same secret published as
//! an inline JWK set. With `--config`, the server loads validator options
//! from the file (plus `OAUTHBEARER_*` environment overrides) and the
//! client presents `--token`.
//!
//! ```text
//! RUST_LOG=debug oauthbearer-demo --connections 8 --extension traceId=42
//! oauthbearer-demo --expired
//! oauthbearer-demo --config broker.toml --token "$(cat token.jwt)"
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clap::Parser;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use oauthbearer::{
    CallbackHandler, ClientExchange, JwtCallbackHandler, OAuthBearerClientFactory,
    OAuthBearerServerFactory, SaslClientFactory, SaslError, SaslExtensions, SaslProperties,
    SaslServerFactory, ServerExchange, TokenCallbackHandler,
};
use oauthbearer_auth::ValidatorOptions;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run SASL OAUTHBEARER handshakes between in-process clients and a server
#[derive(Parser, Debug)]
#[command(name = "oauthbearer-demo", version)]
struct Cli {
    /// Validator options file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Token to present (required with --config)
    #[arg(long, env = "OAUTHBEARER_DEMO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// HMAC secret for self-contained mode
    #[arg(
        long,
        env = "OAUTHBEARER_DEMO_SECRET",
        hide_env_values = true,
        default_value = "demo-secret-demo-secret-demo-secret"
    )]
    secret: String,

    /// Number of concurrent handshakes
    #[arg(long, short = 'n', default_value_t = 4)]
    connections: usize,

    /// Principal of minted tokens (suffixed with the connection number)
    #[arg(long, default_value = "user")]
    principal: String,

    /// Scope claim of minted tokens
    #[arg(long, default_value = "kafka")]
    scope: String,

    /// Authorization id the client requests
    #[arg(long)]
    authzid: Option<String>,

    /// Mint tokens that expired an hour ago
    #[arg(long)]
    expired: bool,

    /// Extension to offer, as name=value (repeatable)
    #[arg(long = "extension", short = 'e', value_parser = parse_extension)]
    extensions: Vec<(String, String)>,
}

fn parse_extension(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let server_handler: Arc<dyn CallbackHandler> = Arc::new(server_handler(&cli)?);

    let mut extensions = SaslExtensions::new();
    for (name, value) in &cli.extensions {
        extensions
            .insert(name.as_str(), value.as_str())
            .with_context(|| format!("invalid extension '{name}'"))?;
    }

    let mut handshakes = JoinSet::new();
    for n in 0..cli.connections {
        let token = client_token(&cli, n)?;
        let client_handler: Arc<dyn CallbackHandler> =
            Arc::new(TokenCallbackHandler::new(token).with_extensions(extensions.clone()));
        let server_handler = Arc::clone(&server_handler);
        let authzid = cli.authzid.clone();

        handshakes.spawn(async move {
            let outcome = connect(n, authzid.as_deref(), client_handler, server_handler).await;
            (n, outcome)
        });
    }

    let (mut succeeded, mut failed) = (0usize, 0usize);
    while let Some(joined) = handshakes.join_next().await {
        let (n, outcome) = joined.context("handshake task panicked")?;
        match outcome {
            Ok(identity) => {
                succeeded += 1;
                info!(connection = n, identity = %identity, "Authenticated");
            }
            Err(e) => {
                failed += 1;
                error!(connection = n, error = %e, "Authentication failed");
            }
        }
    }

    info!(succeeded, failed, "All handshakes finished");
    if failed > 0 && succeeded == 0 {
        bail!("no handshake succeeded");
    }
    Ok(())
}

/// One connection: drive both exchanges until the client completes or
/// either side fails
async fn connect(
    n: usize,
    authzid: Option<&str>,
    client_handler: Arc<dyn CallbackHandler>,
    server_handler: Arc<dyn CallbackHandler>,
) -> Result<String, SaslError> {
    let props = SaslProperties::new();
    let server_name = format!("broker-{n}");

    let (Some(mut client), Some(mut server)) = (
        OAuthBearerClientFactory.create_client(
            &["OAUTHBEARER"],
            authzid,
            "kafka",
            &server_name,
            &props,
            client_handler,
        ),
        OAuthBearerServerFactory.create_server(
            "OAUTHBEARER",
            "kafka",
            &server_name,
            &props,
            server_handler,
        ),
    ) else {
        return Err(SaslError::ProtocolState("mechanism unavailable".into()));
    };

    let result = exchange(&mut client, &mut server).await;
    let identity = result.and_then(|()| server.authorization_id().map(str::to_string));
    client.dispose();
    server.dispose();
    identity
}

async fn exchange(client: &mut ClientExchange, server: &mut ServerExchange) -> Result<(), SaslError> {
    let mut challenge = Vec::new();
    while let Some(response) = client.evaluate_challenge(&challenge).await? {
        challenge = server.evaluate_response(&response).await?;
    }
    Ok(())
}

fn server_handler(cli: &Cli) -> Result<JwtCallbackHandler> {
    let options = match &cli.config {
        Some(path) => ValidatorOptions::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ValidatorOptions {
            jwks: Some(
                json!({"keys": [{
                    "kty": "oct",
                    "kid": "demo",
                    "k": URL_SAFE_NO_PAD.encode(cli.secret.as_bytes()),
                }]})
                .to_string(),
            ),
            allowed_algorithms: Some("HS256".into()),
            ..Default::default()
        },
    };
    JwtCallbackHandler::from_options(&options).context("building validator")
}

fn client_token(cli: &Cli, n: usize) -> Result<String> {
    if cli.config.is_some() {
        return cli
            .token
            .clone()
            .context("--token is required together with --config");
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
    let exp = if cli.expired { now - 3600 } else { now + 3600 };
    let claims = json!({
        "sub": format!("{}-{n}", cli.principal),
        "iat": if cli.expired { now - 7200 } else { now },
        "exp": exp,
        "scope": cli.scope,
    });

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("demo".into());
    Ok(encode(
        &header,
        &claims,
        &EncodingKey::from_secret(cli.secret.as_bytes()),
    )?)
}
