use common::validation::{validate_description, validate_length, validate_name, MAX_DESCRIPTION_LENGTH};
use serde::{Deserialize, Serialize};

use crate::error::IncidentError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Security,
    Maintenance,
    Infrastructure,
    Electrical,
    Emergency,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Security,
        Category::Maintenance,
        Category::Infrastructure,
        Category::Electrical,
        Category::Emergency,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Maintenance => "maintenance",
            Category::Infrastructure => "infrastructure",
            Category::Electrical => "electrical",
            Category::Emergency => "emergency",
            Category::Other => "other",
        }
    }

    /// Display label shown to users; also stored as an alert's `type`
    pub fn label(&self) -> &'static str {
        match self {
            Category::Security => "Segurança",
            Category::Maintenance => "Manutenção",
            Category::Infrastructure => "Infraestrutura",
            Category::Electrical => "Elétrico",
            Category::Emergency => "Emergência",
            Category::Other => "Outro",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("Invalid category: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "Baixa",
            Urgency::Medium => "Média",
            Urgency::High => "Alta",
            Urgency::Critical => "Crítica",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            _ => Err(format!("Invalid urgency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    InReview,
    Resolved,
    ConvertedToAlert,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InReview => "in_review",
            TicketStatus::Resolved => "resolved",
            TicketStatus::ConvertedToAlert => "converted_to_alert",
        }
    }

    /// Still waiting on an administrator
    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Pending | TicketStatus::InReview)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// Status only moves forward: pending → in_review → resolved | converted_to_alert.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        match (self, next) {
            (TicketStatus::Pending, TicketStatus::InReview) => true,
            (TicketStatus::Pending | TicketStatus::InReview, TicketStatus::Resolved) => true,
            (TicketStatus::Pending | TicketStatus::InReview, TicketStatus::ConvertedToAlert) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TicketStatus::Pending),
            "in_review" => Ok(TicketStatus::InReview),
            "resolved" => Ok(TicketStatus::Resolved),
            "converted_to_alert" => Ok(TicketStatus::ConvertedToAlert),
            _ => Err(format!("Invalid ticket status: {}", s)),
        }
    }
}

/// Public alert visible to every user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i64,
    /// Category label at creation time
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub created_by: String,
    pub created_at: String,
    #[serde(default)]
    pub time_ago: String,
    pub status: AlertStatus,
    pub urgency: Urgency,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    pub fn is_resolved(&self) -> bool {
        self.status == AlertStatus::Resolved
    }
}

/// Privately submitted problem report awaiting triage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub urgency: Urgency,
    pub location: String,
    pub created_by: String,
    pub created_at: String,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    /// Weak reference; the alert may since have been deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_to_alert_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Payload for publishing an alert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: Category,
    pub urgency: Urgency,
    pub created_by: String,
}

impl NewAlert {
    pub fn validate(&self) -> Result<(), IncidentError> {
        validate_required(&self.title, &self.description, &self.location, &self.created_by)
    }
}

/// Payload for submitting a ticket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub urgency: Urgency,
    pub location: String,
    pub created_by: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), IncidentError> {
        validate_required(&self.title, &self.description, &self.location, &self.created_by)
    }
}

fn validate_required(
    title: &str,
    description: &str,
    location: &str,
    created_by: &str,
) -> Result<(), IncidentError> {
    validate_name(title, "title")
        .and_then(|_| validate_description(description, "description"))
        .and_then(|_| validate_name(location, "location"))
        .and_then(|_| validate_name(created_by, "createdBy"))
        .map_err(|e| IncidentError::Validation(e.to_string()))
}

pub(crate) fn validate_notes(notes: Option<&str>) -> Result<(), IncidentError> {
    match notes {
        Some(notes) => validate_length(notes, MAX_DESCRIPTION_LENGTH, "adminNotes")
            .map_err(|e| IncidentError::Validation(e.to_string())),
        None => Ok(()),
    }
}

/// Result of resolving an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved(Alert),
    /// Left untouched; the first resolver is kept
    AlreadyResolved(Alert),
    NotFound,
}

/// Result of a ticket status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Updated(Ticket),
    Rejected {
        current: TicketStatus,
        requested: TicketStatus,
    },
    NotFound,
}

impl StatusOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, StatusOutcome::Updated(_))
    }
}

/// Dashboard counters for alerts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    pub critical_active: usize,
}

/// Dashboard counters for tickets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: usize,
    pub pending: usize,
    pub in_review: usize,
    pub resolved: usize,
    pub converted: usize,
}

/// Open tickets grouped the way administrators triage them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriageBuckets {
    pub critical: Vec<Ticket>,
    pub high: Vec<Ticket>,
    pub other: Vec<Ticket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::ConvertedToAlert).unwrap(),
            "\"converted_to_alert\""
        );
        assert_eq!(serde_json::to_string(&TicketStatus::InReview).unwrap(), "\"in_review\"");
        assert_eq!(serde_json::to_string(&Category::Electrical).unwrap(), "\"electrical\"");
        assert_eq!(serde_json::to_string(&Urgency::Critical).unwrap(), "\"critical\"");
        assert!(serde_json::from_str::<Category>("\"plumbing\"").is_err());
    }

    #[test]
    fn test_from_str_is_closed() {
        assert_eq!("Security".parse::<Category>().unwrap(), Category::Security);
        assert_eq!("in_review".parse::<TicketStatus>().unwrap(), TicketStatus::InReview);
        assert!("unknown".parse::<Category>().is_err());
        assert!("urgent".parse::<Urgency>().is_err());
    }

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Critical > Urgency::High);
        assert!(Urgency::High > Urgency::Medium);
        assert!(Urgency::Medium > Urgency::Low);
    }

    #[test]
    fn test_forward_only_transitions() {
        use TicketStatus::*;
        assert!(Pending.can_transition_to(InReview));
        assert!(Pending.can_transition_to(Resolved));
        assert!(InReview.can_transition_to(ConvertedToAlert));
        assert!(!InReview.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(ConvertedToAlert));
        assert!(!ConvertedToAlert.can_transition_to(Resolved));
    }

    #[test]
    fn test_alert_json_shape() {
        let alert = Alert {
            id: 7,
            kind: Category::Security.label().to_string(),
            title: "Portão aberto".to_string(),
            description: "Portão lateral sem trava".to_string(),
            location: "Portaria/Entrada".to_string(),
            created_by: "Administrador".to_string(),
            created_at: "12/08/2025 10:15:00".to_string(),
            time_ago: "agora mesmo".to_string(),
            status: AlertStatus::Active,
            urgency: Urgency::High,
            category: Category::Security,
            resolved_at: None,
            resolved_by: None,
        };

        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "Segurança");
        assert_eq!(value["createdBy"], "Administrador");
        assert_eq!(value["timeAgo"], "agora mesmo");
        assert!(value.get("resolvedAt").is_none());
    }

    #[test]
    fn test_ticket_reads_legacy_json() {
        let raw = r#"{
            "id": 1,
            "title": "Lâmpada queimada",
            "description": "Mesa 15",
            "category": "electrical",
            "urgency": "medium",
            "location": "Biblioteca Central",
            "createdBy": "MARIA SILVA",
            "createdAt": "12/08/2025 12:00:00",
            "status": "converted_to_alert",
            "convertedToAlertId": 42
        }"#;
        let ticket: Ticket = serde_json::from_str(raw).unwrap();
        assert_eq!(ticket.status, TicketStatus::ConvertedToAlert);
        assert_eq!(ticket.converted_to_alert_id, Some(42));
        assert_eq!(ticket.images, None);
    }

    #[test]
    fn test_new_ticket_validation() {
        let ticket = NewTicket {
            title: "Leak".to_string(),
            description: "Water on the floor".to_string(),
            category: Category::Infrastructure,
            urgency: Urgency::High,
            location: "Block A".to_string(),
            created_by: "Estudante".to_string(),
            images: None,
        };
        assert!(ticket.validate().is_ok());

        let missing_location = NewTicket {
            location: "  ".to_string(),
            ..ticket
        };
        let err = missing_location.validate().unwrap_err();
        assert!(matches!(err, IncidentError::Validation(ref msg) if msg.contains("location")));
    }

    #[test]
    fn test_new_alert_requires_author() {
        let alert = NewAlert {
            title: "Queda de energia".to_string(),
            description: "Bloco B sem luz".to_string(),
            location: "Bloco B - Laboratórios".to_string(),
            ..Default::default()
        };
        assert!(alert.validate().is_err());
    }
}
