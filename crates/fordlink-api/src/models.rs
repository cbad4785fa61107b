// Wire types for the FordPass SSO and vehicle API.
//
// The vehicle API wraps most status fields as `{ "value": ... }`
// objects; `Field<T>` models that shape and flattens to an Option
// for consumers.

use secrecy::SecretString;
use serde::Deserialize;

/// Identifier assigned by the remote service to an issued command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub String);

impl CommandId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access + refresh token pair returned by the SSO endpoint.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Lifetime of the access token in seconds, as reported by the SSO.
    pub expires_in_secs: u64,
}

/// Raw SSO token response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

impl From<TokenResponse> for TokenSet {
    fn from(raw: TokenResponse) -> Self {
        Self {
            access_token: raw.access_token.into(),
            refresh_token: raw.refresh_token.into(),
            expires_in_secs: raw.expires_in,
        }
    }
}

/// One entry from the account's vehicle list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDescriptor {
    pub vehicle_id: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_year: Option<String>,
    #[serde(default)]
    pub nick_name: Option<String>,
}

impl VehicleDescriptor {
    /// Display name: nickname when set, otherwise "year make model".
    pub fn display_name(&self) -> String {
        if let Some(nick) = self.nick_name.as_deref().filter(|n| !n.is_empty()) {
            return nick.to_owned();
        }
        let parts: Vec<&str> = [
            self.model_year.as_deref(),
            self.make.as_deref(),
            self.model_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            self.vehicle_id.clone()
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VehicleListResponse {
    #[serde(default)]
    pub vehicles: Vec<VehicleDescriptor>,
}

/// Response to a command issuance.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandResponse {
    pub command_id: CommandId,
}

/// Remote-side status of an issued command.
///
/// Closed set: anything else in `currentStatus` is a deserialization
/// error, not a silent fourth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Queued,
    Success,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandStatusResponse {
    pub current_status: CommandStatus,
}

/// A `{ "value": ... }` field wrapper, the vehicle API's universal
/// shape for status attributes. Absent or null values collapse to None.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Field<T> {
    #[serde(default = "Option::default")]
    pub value: Option<T>,
}

impl<T> Field<T> {
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Full status snapshot for one vehicle, as fetched from the API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStatusEnvelope {
    #[serde(default)]
    pub vehicle_status: VehicleStatusSection,
    #[serde(default)]
    pub vehicle_details: VehicleDetailsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStatusSection {
    #[serde(default)]
    pub lock_status: Field<String>,
    #[serde(default)]
    pub ignition_status: Field<String>,
    #[serde(default)]
    pub fuel_level: Field<f64>,
    #[serde(default)]
    pub charging_status: Field<String>,
    #[serde(default)]
    pub plug_status: Field<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetailsSection {
    #[serde(default)]
    pub battery_charge_level: Field<f64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_nickname() {
        let v = VehicleDescriptor {
            vehicle_id: "1FA0000".into(),
            make: Some("Ford".into()),
            model_name: Some("Mach-E".into()),
            model_year: Some("2023".into()),
            nick_name: Some("Blue Oval".into()),
        };
        assert_eq!(v.display_name(), "Blue Oval");
    }

    #[test]
    fn display_name_falls_back_to_year_make_model() {
        let v = VehicleDescriptor {
            vehicle_id: "1FA0000".into(),
            make: Some("Ford".into()),
            model_name: Some("F-150".into()),
            model_year: Some("2021".into()),
            nick_name: None,
        };
        assert_eq!(v.display_name(), "2021 Ford F-150");
    }

    #[test]
    fn command_status_parses_screaming_case() {
        let status: CommandStatus = serde_json::from_str("\"QUEUED\"").unwrap();
        assert_eq!(status, CommandStatus::Queued);
        assert!(serde_json::from_str::<CommandStatus>("\"PENDING\"").is_err());
    }

    #[test]
    fn status_envelope_tolerates_missing_sections() {
        let envelope: VehicleStatusEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.vehicle_status.lock_status.value.is_none());
        assert!(envelope.vehicle_details.battery_charge_level.value.is_none());
    }
}
