//! Client-local persisted state.
//!
//! A flat JSON object on disk (`~/.railroad/local-state.json`) holding form
//! snapshots, the preference panel, the debug flag and acknowledged hints.
//! It is a convenience only: a missing, unreadable or corrupt file loads as
//! empty, and nothing in the dashboard depends on it being present.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::config;
use crate::pager::DEFAULT_PER_PAGE;

/// Form id of the preferences panel.
pub const PREFERENCES_FORM: &str = "preference_panel";
/// Preference field holding the page size.
pub const PER_PAGE_FIELD: &str = "graphsPerPage";

const DEBUG_KEY: &str = "debug";
const HINTS_KEY: &str = "hints";

#[derive(Debug, Clone, Default)]
pub struct LocalState {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl LocalState {
    /// Load from `path`. Anything unusable reads as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<Value>(&content).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        Self {
            path: Some(path),
            values,
        }
    }

    /// The state file under `~/.railroad`, or an unsaved state when there is
    /// no home directory.
    pub fn open_default() -> Self {
        match default_state_path() {
            Some(path) => Self::load(path),
            None => Self::in_memory(),
        }
    }

    /// State that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // -- Raw key access --

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let removed = self.values.remove(key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.values.clear();
        self.save()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create local state directory")?;
        }
        let json = serde_json::to_string_pretty(&self.values)
            .context("failed to serialize local state")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write local state to {}", path.display()))
    }

    /// Every stored value as one JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }

    // -- Dotted keys --
    //
    // `form.field` addresses one field of a saved form; a bare key addresses
    // a top-level value.

    pub fn lookup(&self, key: &str) -> Option<&Value> {
        match key.split_once('.') {
            Some((form, field)) => self.values.get(form)?.get(field),
            None => self.values.get(key),
        }
    }

    pub fn assign(&mut self, key: &str, value: Value) -> Result<()> {
        match key.split_once('.') {
            Some((form, field)) => {
                let mut fields = self.restore_form(form);
                fields.insert(field.to_string(), value);
                self.save_form(form, fields)
            }
            None => self.set(key, value),
        }
    }

    /// Remove a dotted or bare key. Returns whether it was present.
    pub fn unassign(&mut self, key: &str) -> Result<bool> {
        match key.split_once('.') {
            Some((form, field)) => {
                let mut fields = self.restore_form(form);
                if fields.remove(field).is_none() {
                    return Ok(false);
                }
                self.save_form(form, fields)?;
                Ok(true)
            }
            None => self.delete(key),
        }
    }

    // -- Forms --

    /// Store a form's field values under its id, replacing earlier values.
    pub fn save_form(&mut self, form_id: &str, fields: Map<String, Value>) -> Result<()> {
        self.set(form_id, Value::Object(fields))
    }

    /// A form's saved fields; empty when none were saved.
    pub fn restore_form(&self, form_id: &str) -> Map<String, Value> {
        match self.values.get(form_id) {
            Some(Value::Object(fields)) => fields.clone(),
            _ => Map::new(),
        }
    }

    /// Set one preference field, keeping the others.
    pub fn set_preference(&mut self, field: &str, value: Value) -> Result<()> {
        let mut fields = self.restore_form(PREFERENCES_FORM);
        fields.insert(field.to_string(), value);
        self.save_form(PREFERENCES_FORM, fields)
    }

    pub fn preference(&self, field: &str) -> Option<&Value> {
        self.values.get(PREFERENCES_FORM)?.get(field)
    }

    /// Page size from the preference panel, accepting a number or a numeric
    /// string. Missing, zero or unparseable values give `default`.
    pub fn per_page_or(&self, default: usize) -> usize {
        let parsed = match self.preference(PER_PAGE_FIELD) {
            Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
            Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
            _ => None,
        };
        parsed.filter(|&n| n > 0).unwrap_or(default)
    }

    pub fn per_page(&self) -> usize {
        self.per_page_or(DEFAULT_PER_PAGE)
    }

    // -- Flags --

    pub fn debug(&self) -> bool {
        self.values
            .get(DEBUG_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_debug(&mut self, on: bool) -> Result<()> {
        self.set(DEBUG_KEY, Value::Bool(on))
    }

    pub fn hint_acknowledged(&self, hint: &str) -> bool {
        self.values
            .get(HINTS_KEY)
            .and_then(|hints| hints.get(hint))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn acknowledge_hint(&mut self, hint: &str) -> Result<()> {
        let mut hints = match self.values.get(HINTS_KEY) {
            Some(Value::Object(hints)) => hints.clone(),
            _ => Map::new(),
        };
        hints.insert(hint.to_string(), Value::Bool(true));
        self.set(HINTS_KEY, Value::Object(hints))
    }
}

/// `~/.railroad/local-state.json`.
pub fn default_state_path() -> Option<PathBuf> {
    config::railroad_home().map(|dir| dir.join("local-state.json"))
}

/// Parse a command-line value: JSON when it parses, else a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
