use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use common::{EntityKey, Error, Provider};

/// A confirmed choice handed to export targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub key: EntityKey,
    pub label: String,
    pub provider: Provider,
}

/// Downstream consumer of a selection. Failures are shown to the user.
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;
    fn describe(&self) -> &str;
    /// Returns a short confirmation for the status line.
    fn export(&self, selection: &Selection) -> anyhow::Result<String>;
}

/// Remembers the selection so it can be printed once the terminal is back.
#[derive(Debug, Default)]
pub struct PrintExporter {
    chosen: Mutex<Option<Selection>>,
}

impl PrintExporter {
    pub fn take(&self) -> Option<Selection> {
        self.chosen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Exporter for PrintExporter {
    fn name(&self) -> &str {
        "print"
    }

    fn describe(&self) -> &str {
        "print provider/model on exit"
    }

    fn export(&self, selection: &Selection) -> anyhow::Result<String> {
        *self.chosen.lock().unwrap_or_else(PoisonError::into_inner) = Some(selection.clone());
        Ok(format!("{} will be printed on exit", selection.key))
    }
}

/// Writes a sourceable shell snippet describing the selection.
#[derive(Debug, Clone)]
pub struct EnvFileExporter {
    path: PathBuf,
}

impl EnvFileExporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_data_dir() -> Option<Self> {
        dirs::data_dir().map(|d| Self::new(d.join("pulseboard").join("selection.env")))
    }

    fn render(selection: &Selection) -> String {
        format!(
            "export PULSEBOARD_PROVIDER={}\nexport PULSEBOARD_MODEL={}\nexport PULSEBOARD_BASE_URL={}\n",
            shell_quote(&selection.provider.key),
            shell_quote(&selection.key.id),
            shell_quote(&selection.provider.url),
        )
    }
}

impl Exporter for EnvFileExporter {
    fn name(&self) -> &str {
        "env"
    }

    fn describe(&self) -> &str {
        "write a sourceable selection.env"
    }

    fn export(&self, selection: &Selection) -> anyhow::Result<String> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        std::fs::write(&self.path, Self::render(selection))
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(format!("wrote {}", self.path.display()))
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Ordered list of export targets shown in the picker.
#[derive(Clone, Default)]
pub struct Exporters {
    targets: Vec<Arc<dyn Exporter>>,
}

impl Exporters {
    pub fn new(targets: Vec<Arc<dyn Exporter>>) -> Self {
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Exporter>> {
        self.targets.iter()
    }

    pub fn get(&self, index: usize) -> Result<&Arc<dyn Exporter>, Error> {
        self.targets
            .get(index)
            .ok_or_else(|| Error::InvalidExportTarget(format!("#{index}")))
    }

    pub fn export(&self, index: usize, selection: &Selection) -> anyhow::Result<String> {
        let target = self.get(index)?;
        target
            .export(selection)
            .with_context(|| format!("{} export failed", target.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> Selection {
        Selection {
            key: EntityKey::new("groq", "llama-3.3-70b-versatile"),
            label: "Llama 3.3 70B".into(),
            provider: Provider {
                key: "groq".into(),
                name: "Groq".into(),
                url: "https://api.groq.com/openai/v1/chat/completions".into(),
            },
        }
    }

    #[test]
    fn print_exporter_hands_selection_back_once() {
        let exporter = PrintExporter::default();
        exporter.export(&selection()).unwrap();
        assert_eq!(exporter.take(), Some(selection()));
        assert_eq!(exporter.take(), None);
    }

    #[test]
    fn env_exporter_writes_quoted_snippet() {
        let dir = std::env::temp_dir().join(format!("pulseboard-test-{}", std::process::id()));
        let exporter = EnvFileExporter::new(dir.join("nested").join("selection.env"));
        exporter.export(&selection()).unwrap();
        let text = std::fs::read_to_string(dir.join("nested").join("selection.env")).unwrap();
        assert!(text.contains("export PULSEBOARD_MODEL='llama-3.3-70b-versatile'"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn quoting_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn unknown_target_is_rejected() {
        let exporters = Exporters::new(vec![Arc::new(PrintExporter::default())]);
        let err = exporters.export(3, &selection()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidExportTarget(_))
        ));
    }
}
