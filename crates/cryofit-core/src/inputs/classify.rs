use std::path::{Path, PathBuf};
use tracing::debug;

const MODEL_SUFFIXES: [&str; 3] = [".pdb", ".cif", ".ent"];
const MAP_SUFFIXES: [&str; 3] = [".ccp4", ".map", ".sit"];

/// What a single command-line token turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    ModelFile(PathBuf),
    MapFile(PathBuf),
    /// A `key=value` assignment.
    ParameterString(String),
    /// An existing file that is neither a model nor a map; it is read as a
    /// parameter file when parameters are resolved.
    ParameterFile(PathBuf),
}

/// A parameter argument, kept in command-line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    Assignment(String),
    File(PathBuf),
}

/// The classified view of a run's tokens.
///
/// Bare model and map tokens appear both as `model`/`map` and, rewritten, as
/// assignments in `parameters`, so resolving `parameters` alone reproduces
/// the whole command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub model: Option<PathBuf>,
    pub map: Option<PathBuf>,
    pub parameters: Vec<ParameterSource>,
}

/// Raw run tokens in their original order.
///
/// Classification rewrites bare model and map file names in place to
/// `model=<path>` and `map=<path>`, so the token list can be handed on as
/// parameter strings afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArguments {
    tokens: Vec<String>,
}

fn has_suffix(token: &str, suffixes: &[&str]) -> bool {
    let lower = token.to_ascii_lowercase();
    suffixes.iter().any(|s| lower.ends_with(s))
}

/// Classifies one token without touching the filesystem for model and map
/// suffixes. Tokens containing `=` are always parameter strings.
pub fn classify_token(token: &str) -> TokenKind {
    if token.contains('=') {
        TokenKind::ParameterString(token.to_string())
    } else if has_suffix(token, &MODEL_SUFFIXES) {
        TokenKind::ModelFile(PathBuf::from(token))
    } else if has_suffix(token, &MAP_SUFFIXES) {
        TokenKind::MapFile(PathBuf::from(token))
    } else if Path::new(token).is_file() {
        TokenKind::ParameterFile(PathBuf::from(token))
    } else {
        TokenKind::ParameterString(token.to_string())
    }
}

impl RunArguments {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Classifies every token and rewrites bare model/map tokens in place.
    ///
    /// A missing model or map is not an error here.
    pub fn classify(&mut self) -> Classification {
        let mut out = Classification::default();
        for token in self.tokens.iter_mut() {
            let kind = classify_token(token);
            debug!(token = %token, kind = ?kind, "Classified run token");
            match kind {
                TokenKind::ModelFile(path) => {
                    *token = format!("model={}", path.display());
                    out.parameters.push(ParameterSource::Assignment(token.clone()));
                    out.model = Some(path);
                }
                TokenKind::MapFile(path) => {
                    *token = format!("map={}", path.display());
                    out.parameters.push(ParameterSource::Assignment(token.clone()));
                    out.map = Some(path);
                }
                TokenKind::ParameterString(s) => {
                    out.parameters.push(ParameterSource::Assignment(s))
                }
                TokenKind::ParameterFile(path) => out.parameters.push(ParameterSource::File(path)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn suffixes_select_model_and_map() {
        for name in ["a.pdb", "b.cif", "6exv.ent", "UPPER.PDB"] {
            assert!(matches!(classify_token(name), TokenKind::ModelFile(_)), "{name}");
        }
        for name in ["a.ccp4", "b.map", "c.sit"] {
            assert!(matches!(classify_token(name), TokenKind::MapFile(_)), "{name}");
        }
    }

    #[test]
    fn assignments_are_parameter_strings_even_with_file_suffixes() {
        assert_eq!(
            classify_token("model=x.pdb"),
            TokenKind::ParameterString("model=x.pdb".to_string())
        );
    }

    #[test]
    fn existing_other_files_are_parameter_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.toml");
        fs::write(&path, "").unwrap();
        let token = path.to_string_lossy().into_owned();
        assert_eq!(classify_token(&token), TokenKind::ParameterFile(path));
        assert!(matches!(
            classify_token("no_such_file.toml"),
            TokenKind::ParameterString(_)
        ));
    }

    #[test]
    fn bare_files_are_rewritten_in_place() {
        let mut args = RunArguments::new(["user.pdb", "resolution=2.5", "user.map"]);
        let classification = args.classify();

        assert_eq!(args.tokens(), &["model=user.pdb", "resolution=2.5", "map=user.map"]);
        assert_eq!(classification.model, Some(PathBuf::from("user.pdb")));
        assert_eq!(classification.map, Some(PathBuf::from("user.map")));
        let assignments: Vec<ParameterSource> = args
            .tokens()
            .iter()
            .cloned()
            .map(ParameterSource::Assignment)
            .collect();
        assert_eq!(classification.parameters, assignments);
    }

    #[test]
    fn parameter_files_keep_their_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fit.params");
        fs::write(&path, "").unwrap();
        let file_token = path.to_string_lossy().into_owned();

        let mut args = RunArguments::new(vec!["a=1".to_string(), file_token, "b=2".to_string()]);
        let classification = args.classify();

        assert_eq!(
            classification.parameters,
            vec![
                ParameterSource::Assignment("a=1".to_string()),
                ParameterSource::File(path),
                ParameterSource::Assignment("b=2".to_string()),
            ]
        );
    }

    #[test]
    fn missing_inputs_are_not_an_error() {
        let mut args = RunArguments::new(["map.resolution=4"]);
        let classification = args.classify();
        assert_eq!(classification.model, None);
        assert_eq!(classification.map, None);
    }
}
