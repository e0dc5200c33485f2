use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Stores user-configurable preferences and formatting defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub locale: String,
    pub currency: String,
    #[serde(default = "Config::default_currency_precision")]
    pub currency_precision: u8,
    #[serde(default)]
    pub last_signed_in_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for the store snapshot. Defaults to
    /// `~/Documents/Monedero`.
    pub data_root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for configuration backups.
    pub backup_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "es-CO".into(),
            currency: "COP".into(),
            currency_precision: Self::default_currency_precision(),
            last_signed_in_email: None,
            data_root: None,
            backup_root: None,
        }
    }
}

impl Config {
    pub fn default_currency_precision() -> u8 {
        0
    }

    pub fn resolve_data_root(&self) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }
        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("Monedero")
    }

    pub fn resolve_backup_root(&self) -> PathBuf {
        if let Some(path) = &self.backup_root {
            return path.clone();
        }
        self.resolve_data_root().join("backups")
    }

    /// Formats an amount with the locale's grouping characters, e.g.
    /// `COP 1.250.000` for `es-CO` and `USD 1,250,000.50` for `en-US`.
    pub fn format_currency(&self, amount: f64) -> String {
        let (group_sep, decimal_sep) = if self.locale.starts_with("es") {
            ('.', ',')
        } else {
            (',', '.')
        };
        let negative = amount < 0.0;
        let precision = self.currency_precision as usize;
        let rounded = format!("{:.*}", precision, amount.abs());
        let (integer, fraction) = match rounded.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (rounded.as_str(), None),
        };

        let mut grouped = String::new();
        for (idx, ch) in integer.chars().enumerate() {
            if idx > 0 && (integer.len() - idx) % 3 == 0 {
                grouped.push(group_sep);
            }
            grouped.push(ch);
        }

        let mut out = String::new();
        out.push_str(&self.currency);
        out.push(' ');
        if negative {
            out.push('-');
        }
        out.push_str(&grouped);
        if let Some(frac) = fraction {
            out.push(decimal_sep);
            out.push_str(frac);
        }
        out
    }
}
