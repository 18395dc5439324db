use anyhow::{Result, anyhow, bail};
use dialoguer::Select;
use tokio::process::Command;
use tracing::debug;

use crate::config::PlayerSettings;
use crate::history::theme;
use crate::resolver::PriorityTable;

const PLAYER_ENV_HINT: &str = "ANIVIEW_PLAYER__COMMAND";

/// Lets the user pick one of the resolved links by hand.
///
/// `Ok(None)` means the prompt was dismissed.
pub fn choose_link(links: &[String], priorities: &PriorityTable) -> Result<Option<String>> {
    match links {
        [] => bail!("no links to choose from"),
        [only] => return Ok(Some(only.clone())),
        _ => {}
    }
    let labels: Vec<String> = links
        .iter()
        .map(|link| link_label(link, priorities))
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a stream")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection.map(|idx| links[idx].clone()))
}

fn link_label(link: &str, priorities: &PriorityTable) -> String {
    let host = priorities
        .domains()
        .iter()
        .find(|domain| link.contains(domain.as_str()))
        .map(String::as_str)
        .unwrap_or("other");
    format!("[{host}] {link}")
}

/// Splits the configured command into the program and its leading arguments.
fn split_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut parts = shlex::split(command)
        .ok_or_else(|| anyhow!("player command has unbalanced quotes: {command}"))?;
    if parts.is_empty() {
        bail!("player command is empty");
    }
    let program = parts.remove(0);
    Ok((program, parts))
}

pub fn player_args(
    settings: &PlayerSettings,
    link: &str,
    referer: &str,
    media_title: &str,
) -> Vec<String> {
    let mut args = vec![
        "--quiet".to_string(),
        "--terminal=no".to_string(),
        format!("--force-media-title={media_title}"),
        format!("--referrer={referer}"),
        format!("--http-header-fields=Referer: {referer}"),
    ];
    if !settings.ipc_socket.trim().is_empty() {
        args.push(format!("--input-ipc-server={}", settings.ipc_socket));
    }
    args.extend(settings.extra_args.iter().cloned());
    args.push(link.to_string());
    args
}

pub async fn launch_player(
    settings: &PlayerSettings,
    link: &str,
    referer: &str,
    title: &str,
    episode: &str,
) -> Result<()> {
    let (program, leading) = split_command(&settings.command)?;
    let media_title = format!("{title} - Episode {episode}");
    let args = player_args(settings, link, referer, &media_title);
    debug!(program = %program, ?args, "launching player");

    let mut cmd = Command::new(&program);
    cmd.args(&leading).args(&args);

    let status = match cmd.status().await {
        Ok(status) => status,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(anyhow!(
                    "Player '{}' not found. Install mpv or set {} to a valid command.",
                    program,
                    PLAYER_ENV_HINT
                ));
            }
            return Err(anyhow!(err).context(format!("failed to launch player '{program}'")));
        }
    };

    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}
