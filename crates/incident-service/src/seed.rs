//! Demonstration records loaded on first run

use chrono::{DateTime, Duration, Local};

use crate::stamp::format_timestamp;
use crate::types::{Alert, AlertStatus, Category, Ticket, TicketStatus, Urgency};

const SYSTEM_ADMIN: &str = "Admin Sistema";

/// Three alerts: two active, one resolved
pub fn initial_alerts() -> Vec<Alert> {
    vec![
        Alert {
            id: 1,
            kind: Category::Electrical.label().to_string(),
            title: "Problema na Rede Elétrica".to_string(),
            description: "Quedas de energia intermitentes no segundo andar. Várias salas ficando sem energia por períodos de 10-15 minutos.".to_string(),
            location: "Bloco A - 2º Andar".to_string(),
            created_by: SYSTEM_ADMIN.to_string(),
            created_at: "12/08/2025 14:30".to_string(),
            time_ago: "há 2 horas".to_string(),
            status: AlertStatus::Active,
            urgency: Urgency::Critical,
            category: Category::Electrical,
            resolved_at: None,
            resolved_by: None,
        },
        Alert {
            id: 2,
            kind: Category::Security.label().to_string(),
            title: "Iluminação Defeituosa".to_string(),
            description: "Várias lâmpadas queimadas no estacionamento principal, causando pontos escuros que comprometem a segurança.".to_string(),
            location: "Estacionamento Principal".to_string(),
            created_by: SYSTEM_ADMIN.to_string(),
            created_at: "12/08/2025 10:15".to_string(),
            time_ago: "há 6 horas".to_string(),
            status: AlertStatus::Active,
            urgency: Urgency::High,
            category: Category::Security,
            resolved_at: None,
            resolved_by: None,
        },
        Alert {
            id: 3,
            kind: Category::Maintenance.label().to_string(),
            title: "Banheiro Reformado".to_string(),
            description: "Reforma completa do banheiro masculino da biblioteca foi finalizada com sucesso.".to_string(),
            location: "Biblioteca Central".to_string(),
            created_by: SYSTEM_ADMIN.to_string(),
            created_at: "10/08/2025 16:00".to_string(),
            time_ago: "há 2 dias".to_string(),
            status: AlertStatus::Resolved,
            urgency: Urgency::Medium,
            category: Category::Maintenance,
            resolved_at: Some("11/08/2025 14:00".to_string()),
            resolved_by: Some("Equipe Manutenção".to_string()),
        },
    ]
}

/// Two pending tickets, submitted two hours and thirty minutes before `now`
pub fn example_tickets(now: DateTime<Local>) -> Vec<Ticket> {
    vec![
        Ticket {
            id: 1,
            title: "Lâmpada queimada na Biblioteca".to_string(),
            description: "A lâmpada da mesa 15 na biblioteca está piscando e depois apaga. Está atrapalhando os estudos.".to_string(),
            category: Category::Electrical,
            urgency: Urgency::Medium,
            location: "Biblioteca Central".to_string(),
            created_by: "MARIA SILVA".to_string(),
            created_at: format_timestamp(now - Duration::hours(2)),
            status: TicketStatus::Pending,
            admin_notes: None,
            converted_to_alert_id: None,
            resolved_at: None,
            resolved_by: None,
            images: None,
        },
        Ticket {
            id: 2,
            title: "Vazamento no banheiro do Bloco A".to_string(),
            description: "Há um vazamento grande no banheiro masculino do 2º andar do Bloco A. A água está acumulando no chão e pode causar acidentes.".to_string(),
            category: Category::Infrastructure,
            urgency: Urgency::High,
            location: "Banheiros - Bloco A".to_string(),
            created_by: "JOÃO SANTOS".to_string(),
            created_at: format_timestamp(now - Duration::minutes(30)),
            status: TicketStatus::Pending,
            admin_notes: None,
            converted_to_alert_id: None,
            resolved_at: None,
            resolved_by: None,
            images: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_alert_invariants() {
        let alerts = initial_alerts();
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts.iter().filter(|a| a.is_active()).count(), 2);
        for alert in &alerts {
            // resolvedAt/resolvedBy present iff resolved
            assert_eq!(alert.resolved_at.is_some(), alert.is_resolved());
            assert_eq!(alert.resolved_by.is_some(), alert.is_resolved());
            assert_eq!(alert.kind, alert.category.label());
        }
    }

    #[test]
    fn test_example_tickets_are_pending() {
        let tickets = example_tickets(Local::now());
        assert_eq!(tickets.len(), 2);
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Pending));
        assert_ne!(tickets[0].id, tickets[1].id);
    }
}
