use anyhow::{Context, Result, bail};
use cozy_config::Config;
use cozy_engine::{EditorState, Keymap, Schema, StateJson};
use std::io::{Read, stdin};
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, process};

const USAGE: &str = "Usage: cozy-cli [--doc <state.json>] [CHORD ...]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    doc: Option<PathBuf>,
    chords: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--doc" => {
                let Some(path) = args.next() else {
                    bail!("--doc needs a path");
                };
                parsed.doc = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!("{USAGE}"),
            _ => parsed.chords.push(arg),
        }
    }
    Ok(parsed)
}

/// Press each chord in turn, committing whatever its command produces.
/// Chords with no binding, or whose command declines, leave the state as
/// it was.
fn replay(mut state: EditorState, keymap: &Keymap, chords: &[String]) -> Result<EditorState> {
    for chord in chords {
        match keymap.handle(&state, chord, None) {
            Some(tr) => {
                state = state
                    .apply(tr)
                    .with_context(|| format!("Failed to apply transaction for {chord}"))?;
                log::info!("{chord}: applied, selection now {:?}", state.selection());
            }
            None => log::info!("{chord}: nothing to do"),
        }
    }
    Ok(state)
}

fn read_state(path: Option<&PathBuf>) -> Result<EditorState> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut content = String::new();
            stdin()
                .read_to_string(&mut content)
                .context("Failed to read state from stdin")?;
            content
        }
    };
    let json: StateJson = serde_json::from_str(&content).context("Failed to parse state JSON")?;
    Ok(EditorState::from_json(Arc::new(Schema::cozy()), &json)?)
}

fn init_logging(config: Option<&Config>) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    if let Some(level) = config.and_then(|config| config.log_level.as_deref()) {
        builder.parse_filters(level);
    }
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn run(args: Args, config: Option<Config>) -> Result<()> {
    let config = config.unwrap_or_default();
    let keymap = config.keymap(None)?;
    log::debug!("Key bindings: {keymap:?}");

    let doc_path = args.doc.or(config.document_path);
    let state = read_state(doc_path.as_ref())?;
    let state = replay(state, &keymap, &args.chords)?;

    println!("{}", serde_json::to_string_pretty(&state.to_json())?);
    Ok(())
}

fn main() -> Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    let config = Config::load();
    init_logging(config.as_ref().ok().and_then(Option::as_ref));
    log::info!("Config path: {}", Config::config_path().display());

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring config file: {e}");
            None
        }
    };

    run(args, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_engine::keymap::Platform;
    use cozy_engine::{Selection, cozy_keymap, doc, li, p, ul};
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    // ==== arguments ====

    #[test]
    fn test_parse_args_with_doc_and_chords() {
        let args = parse_args(strings(&["--doc", "state.json", "Enter", "Mod-b"])).unwrap();
        assert_eq!(
            args,
            Args {
                doc: Some(PathBuf::from("state.json")),
                chords: strings(&["Enter", "Mod-b"]),
            }
        );
    }

    #[test]
    fn test_parse_args_chords_only() {
        let args = parse_args(strings(&["Backspace"])).unwrap();
        assert_eq!(args.doc, None);
        assert_eq!(args.chords, strings(&["Backspace"]));
    }

    #[test]
    fn test_parse_args_doc_without_path_fails() {
        assert!(parse_args(strings(&["--doc"])).is_err());
    }

    // ==== replay ====

    #[test]
    fn test_replay_commits_each_chord() {
        let keymap = cozy_keymap(Platform::Other, None);
        let state = doc!(ul!(li!(p!("text<a>")))).state();

        let state = replay(state, &keymap, &strings(&["Enter", "Enter"])).unwrap();

        assert_eq!(state.doc(), &doc!(ul!(li!(p!("text"))), p!()).doc);
        assert_eq!(state.selection(), Selection::cursor(11));
    }

    #[test]
    fn test_replay_skips_unbound_and_declined_chords() {
        let keymap = cozy_keymap(Platform::Other, None);
        let start = doc!(p!("a<a>b"));

        let state = replay(start.state(), &keymap, &strings(&["F13", "Backspace"])).unwrap();

        assert_eq!(state.doc(), &start.doc);
        assert_eq!(state.selection(), start.selection());
    }

    #[test]
    fn test_state_json_output() {
        let state = doc!(p!("hi<a>")).state();
        let json = serde_json::to_value(state.to_json()).unwrap();
        insta::assert_json_snapshot!(json, @r#"
        {
          "doc": {
            "content": [
              {
                "content": [
                  {
                    "text": "hi",
                    "type": "text"
                  }
                ],
                "type": "paragraph"
              }
            ],
            "type": "doc"
          },
          "selection": {
            "anchor": 3,
            "head": 3,
            "type": "text"
          }
        }
        "#);
    }
}
