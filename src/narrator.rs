//! Spoken narration.
//!
//! Every utterance runs on its own short-lived thread. Overlapping
//! utterances are neither ordered nor serialized against each other.

use regex::Regex;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::{Mutex, OnceLock};
use std::thread;

use crate::activity::ActivityLog;
use crate::monitor::config::MonitorConfig;

/// Fire-and-forget speech output.
pub trait Narrator: Send + Sync {
    fn speak(&self, text: &str);

    /// Picks up changed voice settings. Narrators without settings ignore it.
    fn reconfigure(&self, _config: &MonitorConfig) {}
}

/// Removes markdown symbols that speech engines read aloud.
pub fn sanitize_speech(text: &str) -> String {
    static MARKDOWN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = MARKDOWN.get_or_init(|| Regex::new(r"[*#_`\[\]]").ok());
    match pattern {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[derive(Clone, Debug)]
struct SpeechSettings {
    enabled: bool,
    command: Option<Vec<String>>,
    voice: Option<String>,
    device: u32,
}

impl SpeechSettings {
    fn from_config(config: &MonitorConfig) -> Self {
        Self {
            enabled: config.narrator.enabled,
            command: config.narrator.command.clone(),
            voice: config.tts_voice.clone(),
            device: config.audio_device,
        }
    }

    /// Builds argv for `text` and whether the text goes to stdin.
    fn build_command(&self, text: &str) -> (Vec<String>, bool) {
        let voice = self.voice.clone().unwrap_or_default();
        match &self.command {
            Some(template) => {
                let uses_text = template.iter().any(|a| a.contains("{text}"));
                let argv = template
                    .iter()
                    .map(|arg| {
                        arg.replace("{voice}", &voice)
                            .replace("{device}", &self.device.to_string())
                            .replace("{text}", text)
                    })
                    .collect();
                (argv, !uses_text)
            }
            None => (default_command(&voice), true),
        }
    }
}

/// Speaks by running an external speech command.
pub struct CommandNarrator {
    settings: Mutex<SpeechSettings>,
    activity: ActivityLog,
}

impl CommandNarrator {
    pub fn from_config(config: &MonitorConfig, activity: ActivityLog) -> Self {
        Self {
            settings: Mutex::new(SpeechSettings::from_config(config)),
            activity,
        }
    }

    fn settings(&self) -> SpeechSettings {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn build_command(&self, text: &str) -> (Vec<String>, bool) {
        self.settings().build_command(text)
    }
}

#[cfg(windows)]
fn default_command(voice: &str) -> Vec<String> {
    let select_voice = if voice.is_empty() {
        String::new()
    } else {
        format!("$s.SelectVoice('{}'); ", voice.replace('\'', "''"))
    };
    vec![
        "powershell".to_string(),
        "-NoProfile".to_string(),
        "-Command".to_string(),
        format!(
            "Add-Type -AssemblyName System.Speech; \
             $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
             {}$s.Speak([Console]::In.ReadToEnd())",
            select_voice
        ),
    ]
}

#[cfg(not(windows))]
fn default_command(voice: &str) -> Vec<String> {
    let mut argv = vec!["espeak".to_string(), "--stdin".to_string()];
    if !voice.is_empty() {
        argv.push("-v".to_string());
        argv.push(voice.to_string());
    }
    argv
}

fn run_speech_command(argv: &[String], stdin_text: Option<&str>) -> std::io::Result<()> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin_text.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let (Some(text), Some(mut stdin)) = (stdin_text, child.stdin.take()) {
        stdin.write_all(text.as_bytes())?;
    }
    child.wait()?;
    Ok(())
}

impl Narrator for CommandNarrator {
    fn speak(&self, text: &str) {
        let text = sanitize_speech(text);
        if text.is_empty() {
            return;
        }
        self.activity.record(&format!("VOICE: {}", text));
        let settings = self.settings();
        if !settings.enabled {
            return;
        }

        let (argv, use_stdin) = settings.build_command(&text);
        thread::spawn(move || {
            let stdin_text = use_stdin.then_some(text.as_str());
            if let Err(e) = run_speech_command(&argv, stdin_text) {
                crate::log(&format!("Speech error: {}", e));
            }
        });
    }

    fn reconfigure(&self, config: &MonitorConfig) {
        *self.settings.lock().unwrap_or_else(|e| e.into_inner()) = SpeechSettings::from_config(config);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::config::NarratorConfig;

    fn narrator(command: Option<Vec<&str>>) -> CommandNarrator {
        let mut config = MonitorConfig::default();
        config.tts_voice = Some("expr-voice-2-f".to_string());
        config.audio_device = 3;
        config.narrator = NarratorConfig {
            enabled: false,
            command: command.map(|c| c.into_iter().map(String::from).collect()),
        };
        CommandNarrator::from_config(&config, ActivityLog::default())
    }

    #[test]
    fn test_sanitize_speech() {
        assert_eq!(sanitize_speech("  **Raider_99** is [listed] `#1` "), "Raider99 is listed 1");
    }

    #[test]
    fn test_template_placeholders() {
        let n = narrator(Some(vec!["say", "-v", "{voice}", "--device={device}", "{text}"]));
        let (argv, stdin) = n.build_command("hello");
        assert_eq!(argv, vec!["say", "-v", "expr-voice-2-f", "--device=3", "hello"]);
        assert!(!stdin);
    }

    #[test]
    fn test_template_without_text_uses_stdin() {
        let n = narrator(Some(vec!["speaker", "{voice}"]));
        let (argv, stdin) = n.build_command("hello");
        assert_eq!(argv, vec!["speaker", "expr-voice-2-f"]);
        assert!(stdin);
    }

    #[test]
    fn test_default_command_reads_stdin() {
        let (argv, stdin) = narrator(None).build_command("hello");
        assert!(!argv.is_empty());
        assert!(stdin);
    }

    #[test]
    fn test_disabled_narrator_only_logs() {
        let activity = ActivityLog::default();
        let mut config = MonitorConfig::default();
        config.narrator.enabled = false;
        let n = CommandNarrator::from_config(&config, activity.clone());

        n.speak("Overlay *Active*.");
        n.speak("   ");

        let entries = activity.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("VOICE: Overlay Active."));
    }

    #[test]
    fn test_reconfigure_changes_voice() {
        let n = narrator(Some(vec!["say", "-v", "{voice}"]));
        let mut config = MonitorConfig::default();
        config.tts_voice = Some("Zira".to_string());
        config.narrator.command = Some(vec!["say".into(), "-v".into(), "{voice}".into()]);

        n.reconfigure(&config);

        let (argv, _) = n.build_command("hello");
        assert_eq!(argv, vec!["say", "-v", "Zira"]);
    }
}
