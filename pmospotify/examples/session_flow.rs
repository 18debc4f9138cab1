//! Parcours complet d'une session de rapport
//!
//! Sans argument : ouvre une session et affiche l'URL d'autorisation.
//! Avec `<state> <code>` (valeurs reçues sur l'URI de retour) : échange le
//! code, ingère les playlists et liste les répertoires rendus.
//!
//! ```text
//! cargo run -p pmospotify --example session_flow
//! cargo run -p pmospotify --example session_flow -- 1_AbCdEfGh12 AQB...
//! ```

use pmospotify::{InstanceId, ReportSessions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = pmoconfig::get_config();
    let default_level = config.get_log_min_level()?.to_lowercase();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== PMOSpotify - Session de rapport ===\n");

    let sessions = ReportSessions::from_config_obj(config.as_ref())?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [] => {
            let begun = sessions.begin_session().await?;
            println!("✓ Instance créée : {}", begun.id);
            println!("\nOuvrez cette URL dans un navigateur :\n  {}", begun.authorization_url);
            println!("\nPuis relancez avec les paramètres `state` et `code` de l'URI de retour.");
        }
        [state, code] => {
            let id = InstanceId::from_raw(state.as_str());
            let report = sessions.generate_review(&id, code).await?;
            println!(
                "✓ {} playlist(s) retenue(s), {} rendue(s), {} ignorée(s)",
                report.selected,
                report.rendered.len(),
                report.failed.len()
            );
            for path in sessions.list_rendered_artifact_paths(&id).await? {
                println!("  {}", path);
            }
        }
        _ => anyhow::bail!("usage: session_flow [<state> <code>]"),
    }

    Ok(())
}
