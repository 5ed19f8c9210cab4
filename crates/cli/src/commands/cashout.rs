//! Cashout and reversal commands

use anyhow::Result;
use cashpoint_business::{CashoutRequest, CashoutService, ServiceContext};

pub async fn process(
    ctx: &ServiceContext,
    customer_id: &str,
    tokens: i64,
    store_id: &str,
    staff_id: &str,
    notes: Option<String>,
    reference: Option<String>,
) -> Result<()> {
    let mut request = CashoutRequest::new(customer_id, tokens, store_id, staff_id);
    if let Some(notes) = notes.as_deref() {
        request = request.with_notes(notes);
    }
    if let Some(reference) = reference.as_deref() {
        request = request.with_reference(reference);
    }

    let receipt = CashoutService::new(ctx).process_cashout(request).await?;
    let tx = &receipt.transaction;

    if receipt.replayed {
        println!("↩️  Already processed, returning original transaction");
    } else {
        println!("✅ Cashout completed");
    }
    if receipt.used_default_rates {
        println!("⚠️  No active rate config, built-in defaults applied");
    }

    println!("   Transaction: {}", tx.id);
    println!("   Reference:   {}", receipt.reference_id());
    println!("   Tokens:      {}", tx.token_amount);
    println!("   USD:         ${}", tx.usd_amount);
    println!("   Cash to customer: ${}", receipt.cash_to_customer());
    println!("   Balance after:    {} tokens", receipt.balance_after());
    Ok(())
}

pub async fn reverse(
    ctx: &ServiceContext,
    transaction_id: &str,
    actor_id: &str,
    reason: &str,
) -> Result<()> {
    let receipt = CashoutService::new(ctx)
        .reverse_cashout(transaction_id, actor_id, reason)
        .await?;

    println!("↩️  Cashout reversed: {}", receipt.original.id);
    println!("   Reversal:  {}", receipt.reversal.id);
    println!("   Restored:  {} tokens", receipt.reversal.token_amount);
    println!("   Balance:   {} tokens", receipt.reversal.metadata.balance_after());
    Ok(())
}
