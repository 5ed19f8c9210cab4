//! Venue and reconciliation commands

use anyhow::Result;
use cashpoint_business::{ReconciliationService, ServiceContext};
use cashpoint_core::ReconciliationLedger;

use crate::{ReconcileAction, VenueAction};

pub async fn handle_venue(ctx: &ServiceContext, action: VenueAction) -> Result<()> {
    let service = ReconciliationService::new(ctx);

    match action {
        VenueAction::Add {
            store_id,
            name,
            fee_percentage,
        } => {
            let venue = service
                .register_venue(&store_id, &name, fee_percentage)
                .await?;
            println!(
                "✅ Venue registered: {} ({}) at {}%",
                venue.id, venue.name, venue.fee_percentage
            );
        }

        VenueAction::List => {
            let venues = service.list_venues().await?;
            if venues.is_empty() {
                println!("📭 No venues registered");
                return Ok(());
            }
            println!("🏪 Venues:");
            for venue in venues {
                println!("   {} | {} | {}%", venue.id, venue.name, venue.fee_percentage);
            }
        }
    }

    Ok(())
}

pub async fn handle(ctx: &ServiceContext, action: ReconcileAction) -> Result<()> {
    let service = ReconciliationService::new(ctx);

    match action {
        ReconcileAction::Submit {
            store_id,
            date,
            revenue,
            by,
        } => {
            let rec = service
                .submit_daily_reconciliation(&store_id, date, revenue, &by)
                .await?;
            println!("✅ Reconciliation submitted: {}", rec.id);
            print_reconciliation(&rec);
        }

        ReconcileAction::RecordFee {
            reconciliation_id,
            amount,
            by,
        } => {
            let rec = service
                .record_actual_fee(&reconciliation_id, amount, &by)
                .await?;
            println!("🧾 Actual fee recorded for {}", rec.id);
            print_reconciliation(&rec);
        }

        ReconcileAction::Approve {
            reconciliation_id,
            by,
            notes,
        } => {
            let rec = service
                .approve(&reconciliation_id, &by, notes.as_deref())
                .await?;
            println!("✅ Approved {} by {}", rec.id, by);
        }

        ReconcileAction::Flag {
            reconciliation_id,
            by,
            reason,
        } => {
            let rec = service.flag(&reconciliation_id, &by, &reason).await?;
            println!("🚩 Flagged {}: {}", rec.id, reason);
        }

        ReconcileAction::Resolve {
            reconciliation_id,
            by,
            notes,
        } => {
            let rec = service.resolve(&reconciliation_id, &by, &notes).await?;
            println!("✅ Resolved {} by {}", rec.id, by);
        }

        ReconcileAction::PaymentSent {
            reconciliation_id,
            amount,
            method,
            sent_at,
            by,
        } => {
            let sent_at = sent_at.unwrap_or_else(|| ctx.now());
            let rec = service
                .mark_payment_sent(&reconciliation_id, amount, &method, sent_at, &by)
                .await?;
            println!("📤 Payment of ${} sent via {} for {}", amount, method, rec.id);
        }

        ReconcileAction::Confirm {
            reconciliation_id,
            amount,
            received_at,
            by,
        } => {
            let received_at = received_at.unwrap_or_else(|| ctx.now());
            let rec = service
                .confirm_payment_received(&reconciliation_id, amount, received_at, &by)
                .await?;
            println!("📥 Payment confirmed for {}: {}", rec.id, rec.settlement_status);
            println!("   Outstanding: ${}", rec.outstanding_fee());
        }

        ReconcileAction::Dispute {
            reconciliation_id,
            by,
            reason,
        } => {
            let rec = service.dispute(&reconciliation_id, &by, &reason).await?;
            println!("⚠️  Payment disputed for {}: {}", rec.id, reason);
        }

        ReconcileAction::Show { reconciliation_id } => {
            let rec = service.get(&reconciliation_id).await?;
            println!("📋 Reconciliation {}", rec.id);
            print_reconciliation(&rec);
        }

        ReconcileAction::Notes { reconciliation_id } => {
            let notes = service.notes(&reconciliation_id).await?;
            println!("📝 Notes for {}:", reconciliation_id);
            for note in notes {
                println!(
                    "   {} | {} | {} | {}",
                    note.created_at.format("%Y-%m-%d %H:%M:%S"),
                    note.action,
                    note.actor_id,
                    note.note
                );
            }
        }

        ReconcileAction::List { from, to, store } => {
            let rows = match store.as_deref() {
                Some(store_id) => service.list_for_store(store_id, from, to).await?,
                None => service.list_by_date_range(from, to).await?,
            };
            if rows.is_empty() {
                println!("📭 No reconciliations between {} and {}", from, to);
                return Ok(());
            }
            for rec in rows {
                println!(
                    "   {} | {} | {} | expected ${} | actual {} | {} / {}",
                    rec.reconciliation_date,
                    rec.store_id,
                    rec.id,
                    rec.expected_software_fee,
                    rec.actual_software_fee
                        .map(|fee| format!("${}", fee))
                        .unwrap_or_else(|| "-".to_string()),
                    rec.reconciliation_status,
                    rec.settlement_status
                );
            }
        }
    }

    Ok(())
}

fn print_reconciliation(rec: &ReconciliationLedger) {
    println!("   Store:        {}", rec.store_id);
    println!("   Date:         {}", rec.reconciliation_date);
    println!("   Revenue:      ${}", rec.venue_gaming_revenue);
    println!(
        "   Expected fee: ${} ({}%)",
        rec.expected_software_fee, rec.software_fee_percentage
    );
    if let Some(actual) = rec.actual_software_fee {
        println!("   Actual fee:   ${}", actual);
    }
    if let (Some(variance), Some(pct)) = (rec.variance, rec.variance_percentage) {
        println!("   Variance:     ${} ({}%)", variance, pct);
    }
    if let Some(score) = rec.compliance_score {
        println!("   Score:        {}", score);
    }
    println!("   Status:       {}", rec.reconciliation_status);
    println!("   Settlement:   {}", rec.settlement_status);
    if let Some(reason) = &rec.flagged_reason {
        println!("   Flagged:      {}", reason);
    }
}
