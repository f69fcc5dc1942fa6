// src/engine.rs

use crate::error::{AdaptError, Result};
use crate::frame::VideoClip;
use std::fmt;

/// A single keyword argument handed to a plugin entry point.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Floats(Vec<f64>),
    Clip(VideoClip),
}

impl ArgValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => Some(*v),
            ArgValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_clip(&self) -> Option<&VideoClip> {
        match self {
            ArgValue::Clip(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Int(v) => write!(f, "{}", v),
            ArgValue::Float(v) => write!(f, "{}", v),
            ArgValue::Bool(v) => write!(f, "{}", v),
            ArgValue::Str(v) => write!(f, "{:?}", v),
            ArgValue::Floats(v) => write!(f, "{:?}", v),
            ArgValue::Clip(clip) => write!(
                f,
                "<clip {} {}x{}>",
                clip.format().map_or_else(|| "variable".to_string(), |fmt| fmt.name()),
                clip.width(),
                clip.height()
            ),
        }
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        ArgValue::Int(v as i64)
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        ArgValue::Int(v as i64)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<Vec<f64>> for ArgValue {
    fn from(v: Vec<f64>) -> Self {
        ArgValue::Floats(v)
    }
}

impl From<VideoClip> for ArgValue {
    fn from(v: VideoClip) -> Self {
        ArgValue::Clip(v)
    }
}

/// Ordered keyword arguments for a plugin call. Setting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct PluginArgs {
    entries: Vec<(String, ArgValue)>,
}

impl PluginArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ArgValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ArgValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Entries of `other` override entries with the same key.
    pub fn merged(mut self, other: PluginArgs) -> Self {
        for (key, value) in other.entries {
            self.set(&key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PluginArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// The host frame-processing engine. Plugins are addressed by namespace
/// (`eedi2`, `resize`, `fmtc`, ...) and function name.
pub trait Engine {
    fn has_plugin(&self, namespace: &str) -> bool;

    fn invoke(&self, namespace: &str, function: &str, args: PluginArgs) -> Result<VideoClip>;
}

/// Fails unless the engine exposes `namespace`.
pub fn require_plugin(engine: &dyn Engine, namespace: &str) -> Result<()> {
    if engine.has_plugin(namespace) {
        Ok(())
    } else {
        Err(AdaptError::Plugin(format!("`{}` plugin is not available in the engine", namespace)))
    }
}
