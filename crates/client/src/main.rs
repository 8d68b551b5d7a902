use anyhow::Context;
use tracing::{info, warn};

use kaos_auth::allowed_pages;
use kaos_client::{AppContext, ClientConfig, PageOutcome, Route};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("invalid client configuration")?;
    kaos_observability::init(config.log_format);

    info!(
        mode = ?config.auth_mode,
        storage = %config.storage_path.display(),
        "starting kaos client"
    );
    let ctx = AppContext::from_config(config).context("failed to initialize client")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [cmd, email, password] if cmd == "sign-in" => {
            if let Err(err) = ctx.sign_in(email, password).await {
                warn!("sign-in failed: {err}");
                anyhow::bail!(err.user_message());
            }
        }
        [cmd] if cmd == "sign-out" => {
            ctx.sign_out().await;
            return Ok(());
        }
        [cmd, path] if cmd == "open" => {
            report(&ctx, path).await;
            return Ok(());
        }
        [] => {}
        _ => anyhow::bail!("usage: kaos-client [sign-in <email> <password> | sign-out | open <path>]"),
    }

    let check = ctx.auth().check_session().await;
    match check.session {
        Some(session) => {
            let pages: Vec<&str> = allowed_pages(session.role).iter().map(|p| p.as_str()).collect();
            info!(
                user_id = %session.user_id,
                role = %session.role,
                ?pages,
                reachable = check.collaborator_reachable,
                "session active"
            );
            report(&ctx, Route::AuthenticatedArea.path()).await;
        }
        None => {
            ctx.navigate(Route::Login).await;
            info!("no session; sign in required");
        }
    }
    Ok(())
}

async fn report(ctx: &AppContext, path: &str) {
    match ctx.open_page(path).await {
        PageOutcome::Rendered { page, session } => {
            info!(%page, user = %session.display_name, "page rendered")
        }
        PageOutcome::Forbidden(explanation) => warn!(reason = %explanation.reason, "access denied"),
        PageOutcome::NotFound => warn!(path, "no such page"),
        PageOutcome::LoginRequired(outcome) => info!(?outcome, "login required"),
    }
}
