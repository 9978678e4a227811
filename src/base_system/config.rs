//! 配置文件读写与带注释生成。
//!
//! 配置文件是可选的（`--config PATH`）。文件不存在时写出带注释的默认配置；
//! 存在时用户字段覆盖默认值，缺失的字段会被补写回文件。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    fn fields() -> &'static [FieldMeta];
}

pub fn load_or_create<T: ConfigSpec>(path: &Path) -> Result<T, ConfigError> {
    ensure_parent(path)?;

    if !path.exists() {
        let default_config = T::default();
        write_with_comments(&default_config, path)?;
        return Ok(default_config);
    }

    let user_yaml = read_yaml(path)?;

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    let complete = has_all_fields::<T>(&user_yaml);
    merge_values(&mut merged, user_yaml);

    let config: T =
        serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))?;

    if !complete {
        write_with_comments(&config, path)?;
    }

    Ok(config)
}

pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    ensure_parent(path)?;
    let yaml = generate_yaml_with_comments(config)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let mapping = match value {
        Value::Mapping(map) => map,
        _ => {
            return Err(ConfigError::Validation(
                "config must serialize to a mapping".to_string(),
            ));
        }
    };

    let mut lines = Vec::new();
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim().to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // 空文件视为空映射
    if raw.trim().is_empty() {
        return Ok(Value::Mapping(serde_yaml::Mapping::new()));
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn has_all_fields<T: ConfigSpec>(user_yaml: &Value) -> bool {
    let Value::Mapping(map) = user_yaml else {
        return false;
    };
    T::fields()
        .iter()
        .all(|field| map.contains_key(Value::String(field.name.to_string())))
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        // `key:` with no value keeps the default
        (_, Value::Null) => {}
        (dest, other) => {
            *dest = other;
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
