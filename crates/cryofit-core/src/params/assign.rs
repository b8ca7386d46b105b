use super::file::FileConfig;
use crate::engine::config::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Full dotted names of every assignable parameter.
pub const PARAMETERS: &[&str] = &[
    "input.model_file_name",
    "input.map_file_name",
    "output.output_file_name_prefix",
    "gui.output_dir",
    "map.resolution",
    "annealing.start_temperature",
    "annealing.final_temperature",
    "annealing.cool_rate",
    "annealing.number_of_steps",
    "annealing.update_grads_shift",
    "annealing.interleave_minimization",
    "annealing.time_step",
    "annealing.random_seed",
    "annealing.map_weight",
    "annealing.restraint_weight",
    "diagnostics.post_fit_cc",
];

/// Short keys written by the input classifier for bare model and map tokens.
/// They would otherwise also prefix-match `annealing.map_weight` and friends.
const ALIASES: &[(&str, &str)] = &[
    ("model", "input.model_file_name"),
    ("map", "input.map_file_name"),
];

/// Whether `key` addresses `parameter`: the last component of `key` is a
/// prefix of the parameter's name, and any leading components name its
/// enclosing sections.
fn abbreviates(key: &[&str], parameter: &str, exact_name: bool) -> bool {
    let path: Vec<&str> = parameter.split('.').collect();
    let Some((key_name, key_scopes)) = key.split_last() else {
        return false;
    };
    let Some((name, scopes)) = path.split_last() else {
        return false;
    };
    let name_matches = if exact_name {
        name == key_name
    } else {
        name.starts_with(key_name)
    };
    name_matches && key_scopes.len() <= scopes.len() && scopes.ends_with(key_scopes)
}

/// Resolves a possibly abbreviated key to a full parameter name.
///
/// A key whose last component equals a parameter name wins over keys that
/// merely prefix one, so `output_dir` is not confused with
/// `output_file_name_prefix`.
pub fn resolve_key(key: &str) -> Result<&'static str, ConfigError> {
    let key = key.trim();
    let parts: Vec<&str> = key.split('.').collect();
    if key.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::UnknownParameter(key.to_string()));
    }
    if let Some((_, parameter)) = ALIASES.iter().find(|(alias, _)| *alias == key) {
        return Ok(parameter);
    }

    for exact in [true, false] {
        let candidates: Vec<&'static str> = PARAMETERS
            .iter()
            .copied()
            .filter(|p| abbreviates(&parts, p, exact))
            .collect();
        match candidates.as_slice() {
            [] => continue,
            [single] => return Ok(*single),
            many => {
                return Err(ConfigError::AmbiguousParameter {
                    key: key.to_string(),
                    candidates: many.iter().map(|c| c.to_string()).collect(),
                });
            }
        }
    }
    Err(ConfigError::UnknownParameter(key.to_string()))
}

fn parse_value<T: FromStr>(parameter: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        parameter,
        reason: format!("cannot parse '{}'", value),
    })
}

fn parse_bool(parameter: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            parameter,
            reason: format!("expected a boolean, got '{}'", value),
        }),
    }
}

/// `None` (any case) or an empty value unsets an optional text parameter.
fn optional_text(value: &str) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Applies one `key=value` argument to `config`.
///
/// # Errors
///
/// * [`ConfigError::MalformedParameter`] when there is no `=`.
/// * [`ConfigError::UnknownParameter`] / [`ConfigError::AmbiguousParameter`]
///   when the key does not resolve to exactly one parameter.
/// * [`ConfigError::InvalidValue`] when the value does not parse as the
///   parameter's type.
pub fn apply_assignment(config: &mut FileConfig, assignment: &str) -> Result<(), ConfigError> {
    let (key, raw_value) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedParameter(assignment.to_string()))?;
    let parameter = resolve_key(key)?;
    let value = raw_value.trim().trim_matches('"');

    match parameter {
        "input.model_file_name" => {
            config.input.model_file_name = optional_text(value).map(PathBuf::from)
        }
        "input.map_file_name" => {
            config.input.map_file_name = optional_text(value).map(PathBuf::from)
        }
        "output.output_file_name_prefix" => {
            config.output.output_file_name_prefix = optional_text(value)
        }
        "gui.output_dir" => config.gui.output_dir = optional_text(value).map(PathBuf::from),
        "map.resolution" => config.map.resolution = Some(parse_value(parameter, value)?),
        "annealing.start_temperature" => {
            config.annealing.start_temperature = Some(parse_value(parameter, value)?)
        }
        "annealing.final_temperature" => {
            config.annealing.final_temperature = Some(parse_value(parameter, value)?)
        }
        "annealing.cool_rate" => config.annealing.cool_rate = Some(parse_value(parameter, value)?),
        "annealing.number_of_steps" => {
            config.annealing.number_of_steps = Some(parse_value(parameter, value)?)
        }
        "annealing.update_grads_shift" => {
            config.annealing.update_grads_shift = Some(parse_value(parameter, value)?)
        }
        "annealing.interleave_minimization" => {
            config.annealing.interleave_minimization = Some(parse_bool(parameter, value)?)
        }
        "annealing.time_step" => config.annealing.time_step = Some(parse_value(parameter, value)?),
        "annealing.random_seed" => {
            config.annealing.random_seed = Some(parse_value(parameter, value)?)
        }
        "annealing.map_weight" => {
            config.annealing.map_weight = Some(parse_value(parameter, value)?)
        }
        "annealing.restraint_weight" => {
            config.annealing.restraint_weight = Some(parse_value(parameter, value)?)
        }
        "diagnostics.post_fit_cc" => {
            config.diagnostics.post_fit_cc = Some(parse_bool(parameter, value)?)
        }
        _ => return Err(ConfigError::UnknownParameter(key.to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_resolve_to_input_files() {
        assert_eq!(resolve_key("model").unwrap(), "input.model_file_name");
        assert_eq!(resolve_key("map").unwrap(), "input.map_file_name");
        assert_eq!(resolve_key("model_file_name").unwrap(), "input.model_file_name");
        assert_eq!(resolve_key("input.map").unwrap(), "input.map_file_name");
    }

    #[test]
    fn full_paths_and_scoped_abbreviations_resolve() {
        assert_eq!(resolve_key("map.resolution").unwrap(), "map.resolution");
        assert_eq!(resolve_key("resolution").unwrap(), "map.resolution");
        assert_eq!(resolve_key("annealing.number").unwrap(), "annealing.number_of_steps");
        assert_eq!(resolve_key("output_dir").unwrap(), "gui.output_dir");
    }

    #[test]
    fn ambiguous_and_unknown_keys_are_errors() {
        assert!(matches!(
            resolve_key("output"),
            Err(ConfigError::AmbiguousParameter { .. })
        ));
        assert!(matches!(
            resolve_key("annealing.model"),
            Err(ConfigError::UnknownParameter(_))
        ));
        assert!(matches!(resolve_key("bogus"), Err(ConfigError::UnknownParameter(_))));
        assert!(matches!(resolve_key(""), Err(ConfigError::UnknownParameter(_))));
        assert!(matches!(
            resolve_key("ma"),
            Err(ConfigError::AmbiguousParameter { .. })
        ));
    }

    #[test]
    fn assignments_are_typed() {
        let mut config = FileConfig::default();
        apply_assignment(&mut config, "model=a.pdb").unwrap();
        apply_assignment(&mut config, "number_of_steps=25").unwrap();
        apply_assignment(&mut config, "interleave_minimization=True").unwrap();
        apply_assignment(&mut config, "map_weight=5.5").unwrap();

        assert_eq!(config.input.model_file_name, Some(PathBuf::from("a.pdb")));
        assert_eq!(config.annealing.number_of_steps, Some(25));
        assert_eq!(config.annealing.interleave_minimization, Some(true));
        assert_eq!(config.annealing.map_weight, Some(5.5));
    }

    #[test]
    fn none_unsets_optional_text() {
        let mut config = FileConfig::default();
        apply_assignment(&mut config, "map=x.ccp4").unwrap();
        apply_assignment(&mut config, "map=None").unwrap();
        assert_eq!(config.input.map_file_name, None);
    }

    #[test]
    fn bad_values_and_malformed_arguments_are_errors() {
        let mut config = FileConfig::default();
        assert!(matches!(
            apply_assignment(&mut config, "number_of_steps=many"),
            Err(ConfigError::InvalidValue {
                parameter: "annealing.number_of_steps",
                ..
            })
        ));
        assert!(matches!(
            apply_assignment(&mut config, "just_a_word"),
            Err(ConfigError::MalformedParameter(_))
        ));
    }
}
