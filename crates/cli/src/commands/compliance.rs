//! Compliance summaries and journal audit

use anyhow::Result;
use cashpoint_business::{ComplianceSummary, ReconciliationService, ServiceContext};
use cashpoint_persistence::{EventFilter, EventReader, JournalSummary};
use chrono::{NaiveDate, Utc};
use std::path::Path;

use crate::ComplianceAction;

pub async fn handle(ctx: &ServiceContext, action: ComplianceAction) -> Result<()> {
    let service = ReconciliationService::new(ctx);

    let (summary, json) = match action {
        ComplianceAction::System { from, to, json } => {
            (service.system_compliance_summary(from, to).await?, json)
        }
        ComplianceAction::Venue {
            store_id,
            from,
            to,
            json,
        } => (
            service.venue_compliance_summary(&store_id, from, to).await?,
            json,
        ),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ComplianceSummary) {
    let scope = summary.store_id.as_deref().unwrap_or("all venues");
    println!(
        "📊 Compliance summary for {} ({} to {})",
        scope, summary.from, summary.to
    );
    println!("   Reconciliations: {}", summary.total_reconciliations);
    println!(
        "   Pending {} | Approved {} | Flagged {} | Resolved {}",
        summary.pending, summary.approved, summary.flagged, summary.resolved
    );
    println!(
        "   Settled {} | Disputed {}",
        summary.settled, summary.disputed
    );
    match summary.average_compliance_score {
        Some(avg) => println!("   Avg score:       {} ({} scored)", avg, summary.scored),
        None => println!("   Avg score:       -"),
    }
    println!("   Revenue:         ${}", summary.total_revenue);
    println!("   Expected fee:    ${}", summary.total_expected_fee);
    println!("   Actual fee:      ${}", summary.total_actual_fee);
    println!("   Variance:        ${}", summary.total_variance);
    println!("   Outstanding:     ${}", summary.outstanding_fee);
}

/// Read journal events, filter and summarize
pub fn show_journal(
    journal_dir: &Path,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    subject: Option<String>,
    actor: Option<String>,
) -> Result<()> {
    let reader = EventReader::new(journal_dir);
    let events = match from {
        Some(from) => {
            let to = to.unwrap_or_else(|| Utc::now().date_naive());
            reader.read_range(from, to)?
        }
        None => reader.read_all()?,
    };

    let mut filter = EventFilter::new();
    if let Some(subject) = subject.as_deref() {
        filter = filter.subject(subject);
    }
    if let Some(actor) = actor.as_deref() {
        filter = filter.actor(actor);
    }
    let events = filter.apply(events);

    if events.is_empty() {
        println!("📭 No journal events found");
        return Ok(());
    }

    println!("📒 Journal events:");
    for event in &events {
        println!("   {}", event);
    }
    println!();
    println!("{}", JournalSummary::generate(&events).summary());
    Ok(())
}
