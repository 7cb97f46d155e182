//! chocopkgup `.exe.config` access and patching.
//!
//! The file is a .NET application configuration document:
//!
//! ```xml
//! <configuration>
//!   <appSettings>
//!     <add key="PackagesFolder" value="C:\packages"/>
//!   </appSettings>
//!   <startup>
//!     <supportedRuntime version="v4.0" sku=".NETFramework,Version=v4.0"/>
//!   </startup>
//! </configuration>
//! ```
//!
//! Patching changes one `value` attribute and leaves everything else, including
//! elements noel knows nothing about, where it was.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use xml::attribute::OwnedAttribute;
use xml::name::OwnedName;

use crate::error::NoelError;
use crate::fsutil::write_atomic;
use crate::xml_doc::{Element, XmlDocument};

const ROOT_ELEMENT: &str = "configuration";
const APP_SETTINGS_ELEMENT: &str = "appSettings";
const ADD_ELEMENT: &str = "add";
const STARTUP_ELEMENT: &str = "startup";
const SUPPORTED_RUNTIME_ELEMENT: &str = "supportedRuntime";

/// A key/value entry of `appSettings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// The `startup/supportedRuntime` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedRuntime {
    pub version: Option<String>,
    pub sku: Option<String>,
}

/// Parsed application configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    document: XmlDocument,
}

impl AppConfig {
    /// Parse a configuration document. The root element must be
    /// `configuration`.
    pub fn parse(source: &[u8]) -> Result<Self, String> {
        let document = XmlDocument::parse(source)?;
        if !document.root.is_named(ROOT_ELEMENT) {
            return Err(format!(
                "XML Parse Error: Expected top level element: <{}>. Instead found: <{}>",
                ROOT_ELEMENT, document.root.name
            ));
        }
        Ok(Self { document })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        self.document.to_bytes()
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// All settings in document order. Entries without a `key` are skipped.
    pub fn settings(&self) -> Vec<Setting> {
        self.adds()
            .filter_map(|add| {
                Some(Setting {
                    key: add.attr("key")?.to_string(),
                    value: add.attr("value").unwrap_or_default().to_string(),
                })
            })
            .collect()
    }

    /// Value of the first setting named `key`.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.adds()
            .find(|add| add.attr("key") == Some(key))
            .map(|add| add.attr("value").unwrap_or_default())
    }

    pub fn supported_runtime(&self) -> Option<SupportedRuntime> {
        let runtime = self
            .document
            .root
            .child(STARTUP_ELEMENT)?
            .child(SUPPORTED_RUNTIME_ELEMENT)?;
        Some(SupportedRuntime {
            version: runtime.attr("version").map(str::to_string),
            sku: runtime.attr("sku").map(str::to_string),
        })
    }

    /// Set the first setting named `key` to `value`.
    ///
    /// Returns the value it replaced, or `None` when no setting has that key.
    /// A setting with a `key` but no `value` attribute gains one at the end of
    /// its attribute list.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Option<String> {
        let add = self
            .document
            .root
            .child_mut(APP_SETTINGS_ELEMENT)?
            .child_elements_mut()
            .filter(|e| e.is_named(ADD_ELEMENT))
            .find(|add| add.attr("key") == Some(key))?;

        let previous = add.attr("value").unwrap_or_default().to_string();
        if !add.set_attr("value", value) {
            add.attributes
                .push(OwnedAttribute::new(OwnedName::local("value"), value));
        }
        Some(previous)
    }

    fn adds(&self) -> impl Iterator<Item = &Element> {
        self.document
            .root
            .child(APP_SETTINGS_ELEMENT)
            .into_iter()
            .flat_map(|settings| settings.child_elements())
            .filter(|e| e.is_named(ADD_ELEMENT))
    }
}

/// What [`set_setting_value`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The file was rewritten; `previous` is the old value
    Updated { previous: String },
    /// The setting already had the requested value; nothing was written
    Unchanged,
}

impl PatchOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, PatchOutcome::Unchanged)
    }
}

/// Load the configuration at `path`.
pub fn load(path: &Path) -> Result<AppConfig, NoelError> {
    let source = fs::read(path).map_err(|e| NoelError::io(path, e))?;
    AppConfig::parse(&source).map_err(|message| NoelError::parse(path, message))
}

/// Set the first `appSettings/add` whose key is `key` to `new_value` and
/// rewrite the file.
///
/// Nothing is written when the key is missing or the value is already
/// `new_value`. The rewrite goes through a temp file renamed over `path`.
pub fn set_setting_value(
    path: &Path,
    key: &str,
    new_value: &str,
) -> Result<PatchOutcome, NoelError> {
    let mut config = load(path)?;

    let current = config
        .setting(key)
        .ok_or_else(|| NoelError::SettingNotFound {
            key: key.to_string(),
            path: PathBuf::from(path),
        })?;

    if current == new_value {
        debug!("{} already set to {:?} in {:?}", key, new_value, path);
        return Ok(PatchOutcome::Unchanged);
    }

    let previous = config
        .set_setting(key, new_value)
        .ok_or_else(|| NoelError::SettingNotFound {
            key: key.to_string(),
            path: PathBuf::from(path),
        })?;
    info!("{} (old): {}", key, previous);
    info!("{} (new): {}", key, new_value);

    let bytes = config.to_bytes().map_err(|message| {
        NoelError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, message),
        )
    })?;
    write_atomic(path, &bytes)?;

    Ok(PatchOutcome::Updated { previous })
}
