//! Quick journal builders
//!
//! Shortcuts that assemble a common journal shape (transfer, conversion,
//! adjustment, BOM production) as a draft and optionally confirm it in a
//! second step. When `auto_confirm` is set and confirmation fails, the
//! draft is kept and the confirmation error is returned.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_positive_quantity, JournalType, StockJournalWithItems};
use uuid::Uuid;
use validator::Validate;

use super::bom::expand_in;
use super::stock_journal::{CreateJournalInput, JournalLineInput, StockJournalService};
use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Move stock of one product between two godowns
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub source_godown_id: Uuid,
    pub destination_godown_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub rate: Option<Decimal>,
    pub journal_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub narration: Option<String>,
    #[serde(default)]
    pub auto_confirm: bool,
}

/// Turn a quantity of one product into a quantity of another
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConversionInput {
    pub source_product_id: Uuid,
    pub source_quantity: Decimal,
    pub destination_product_id: Uuid,
    pub destination_quantity: Decimal,
    pub godown_id: Uuid,
    /// Defaults to `godown_id`
    pub destination_godown_id: Option<Uuid>,
    pub source_rate: Option<Decimal>,
    pub destination_rate: Option<Decimal>,
    pub journal_date: Option<NaiveDate>,
    pub additional_cost: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub narration: Option<String>,
    #[serde(default)]
    pub auto_confirm: bool,
}

/// Correct a stock count. Positive quantity adds stock, negative removes it.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustmentInput {
    pub product_id: Uuid,
    pub godown_id: Uuid,
    pub quantity: Decimal,
    pub batch_id: Option<Uuid>,
    pub rate: Option<Decimal>,
    pub journal_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 2000))]
    pub narration: Option<String>,
    #[serde(default)]
    pub auto_confirm: bool,
}

/// Produce a finished product from its BOM
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BomProductionInput {
    pub bom_id: Uuid,
    pub output_quantity: Decimal,
    /// Godown the components are consumed from
    pub source_godown_id: Uuid,
    /// Godown the output lands in; defaults to the source godown
    pub destination_godown_id: Option<Uuid>,
    pub output_rate: Option<Decimal>,
    pub additional_cost: Option<Decimal>,
    pub journal_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub narration: Option<String>,
    #[serde(default)]
    pub auto_confirm: bool,
}

/// Builds and optionally confirms common journal shapes
#[derive(Clone)]
pub struct QuickJournalService {
    journals: StockJournalService,
    store: Arc<dyn LedgerStore>,
}

impl QuickJournalService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            journals: StockJournalService::new(store.clone()),
            store,
        }
    }

    pub async fn transfer(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        input: TransferInput,
    ) -> AppResult<StockJournalWithItems> {
        input.validate()?;
        validate_positive_quantity(input.quantity).map_err(|m| AppError::validation("quantity", m))?;
        if input.source_godown_id == input.destination_godown_id {
            return Err(AppError::validation(
                "destination_godown_id",
                "Source and destination godowns must differ",
            ));
        }

        let line = JournalLineInput {
            batch_id: input.batch_id,
            rate: input.rate,
            ..JournalLineInput::new(input.product_id, input.quantity)
        };

        let mut journal = CreateJournalInput::new(JournalType::Transfer);
        journal.journal_date = input.journal_date;
        journal.source_godown_id = Some(input.source_godown_id);
        journal.destination_godown_id = Some(input.destination_godown_id);
        journal.narration = input.narration;
        journal.source_items = vec![line.clone()];
        journal.destination_items = vec![line];

        self.finish(company_id, user_id, journal, input.auto_confirm).await
    }

    pub async fn conversion(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        input: ConversionInput,
    ) -> AppResult<StockJournalWithItems> {
        input.validate()?;
        validate_positive_quantity(input.source_quantity)
            .map_err(|m| AppError::validation("source_quantity", m))?;
        validate_positive_quantity(input.destination_quantity)
            .map_err(|m| AppError::validation("destination_quantity", m))?;

        let mut journal = CreateJournalInput::new(JournalType::Conversion);
        journal.journal_date = input.journal_date;
        journal.source_godown_id = Some(input.godown_id);
        journal.destination_godown_id = Some(input.destination_godown_id.unwrap_or(input.godown_id));
        journal.additional_cost = input.additional_cost;
        journal.narration = input.narration;
        journal.source_items = vec![JournalLineInput {
            rate: input.source_rate,
            ..JournalLineInput::new(input.source_product_id, input.source_quantity)
        }];
        journal.destination_items = vec![JournalLineInput {
            rate: input.destination_rate,
            ..JournalLineInput::new(input.destination_product_id, input.destination_quantity)
        }];

        self.finish(company_id, user_id, journal, input.auto_confirm).await
    }

    /// An increase becomes a destination-only journal, a decrease a source-only one
    pub async fn adjustment(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        input: AdjustmentInput,
    ) -> AppResult<StockJournalWithItems> {
        input.validate()?;
        if input.quantity.is_zero() {
            return Err(AppError::validation("quantity", "Adjustment quantity cannot be zero"));
        }

        let line = JournalLineInput {
            godown_id: Some(input.godown_id),
            batch_id: input.batch_id,
            rate: input.rate,
            ..JournalLineInput::new(input.product_id, input.quantity.abs())
        };

        let mut journal = CreateJournalInput::new(JournalType::Adjustment);
        journal.journal_date = input.journal_date;
        journal.narration = input.narration;
        if input.quantity > Decimal::ZERO {
            journal.destination_godown_id = Some(input.godown_id);
            journal.destination_items = vec![line];
        } else {
            journal.source_godown_id = Some(input.godown_id);
            journal.source_items = vec![line];
        }

        self.finish(company_id, user_id, journal, input.auto_confirm).await
    }

    /// Components become source lines, the finished product the destination line
    pub async fn bom_production(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        input: BomProductionInput,
    ) -> AppResult<StockJournalWithItems> {
        input.validate()?;

        let (bom, requirements) = {
            let mut tx = self.store.begin().await?;
            let expansion = expand_in(&mut *tx, company_id, input.bom_id, input.output_quantity).await?;
            tx.commit().await?;
            expansion
        };

        let mut journal = CreateJournalInput::new(JournalType::Manufacturing);
        journal.journal_date = input.journal_date;
        journal.bom_id = Some(bom.id);
        journal.source_godown_id = Some(input.source_godown_id);
        journal.destination_godown_id = Some(input.destination_godown_id.unwrap_or(input.source_godown_id));
        journal.additional_cost = input.additional_cost;
        journal.narration = input
            .narration
            .or_else(|| Some(format!("Production of {} {} via {}", input.output_quantity, bom.output_unit, bom.name)));
        journal.source_items = requirements
            .into_iter()
            .map(|req| JournalLineInput {
                unit: Some(req.unit),
                ..JournalLineInput::new(req.product_id, req.required_quantity)
            })
            .collect();
        journal.destination_items = vec![JournalLineInput {
            unit: Some(bom.output_unit.clone()),
            rate: input.output_rate,
            ..JournalLineInput::new(bom.finished_product_id, input.output_quantity)
        }];

        self.finish(company_id, user_id, journal, input.auto_confirm).await
    }

    async fn finish(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        journal: CreateJournalInput,
        auto_confirm: bool,
    ) -> AppResult<StockJournalWithItems> {
        let draft = self.journals.create_journal(company_id, user_id, journal).await?;
        if !auto_confirm {
            return Ok(draft);
        }
        self.journals
            .confirm_journal(company_id, user_id, draft.journal.id)
            .await
    }
}
