use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ImageConfigError;

/// The runtime configuration of an OCI/Docker image, as found in the
/// `config` object of an image config JSON document.
///
/// `entrypoint` and `cmd` keep the difference between "not set" (`None`)
/// and "explicitly empty" (`Some(vec![])`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub working_dir: String,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub env: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,

    /// Keys are `port[/proto]`, values are empty objects.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub exposed_ports: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthConfig>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub on_build: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub shell: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub volumes: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stop_signal: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub args_escaped: bool,

    /// Operating system of the image. Not part of the `config` object in
    /// image documents, callers copy it over from the enclosing image.
    #[serde(rename = "OS", default, skip_serializing_if = "String::is_empty")]
    pub os: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthConfig {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub test: Vec<String>,

    /// Durations are in nanoseconds.
    #[serde(default)]
    pub interval: i64,
    #[serde(default)]
    pub timeout: i64,
    #[serde(default)]
    pub start_period: i64,
    #[serde(default)]
    pub start_interval: i64,
    #[serde(default)]
    pub retries: i64,
}

/// Image documents written by Docker use `null` for empty lists and maps.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ImageConfig {
    pub fn from_json(data: &[u8]) -> Result<Self, ImageConfigError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Whether any of the fields without a dedicated setter are set.
    pub fn has_extra_metadata(&self) -> bool {
        self.healthcheck.is_some()
            || !self.on_build.is_empty()
            || !self.shell.is_empty()
            || !self.volumes.is_empty()
            || !self.stop_signal.is_empty()
    }
}
