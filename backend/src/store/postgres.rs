//! PostgreSQL ledger store
//!
//! Enum columns are stored as TEXT and converted with the model's
//! `as_str`/`from_str` pair. Row locks use `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    Batch, BillOfMaterial, BomComponent, Godown, ItemSide, JournalStatus, JournalType,
    MovementKind, NewStockEntry, Product, StockEntry, StockJournal, StockJournalItem,
    StockReference,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{EntryFilter, JournalFilter, LedgerStore, LedgerTx};
use crate::error::{map_unique_violation, AppError, AppResult};

const PRODUCT_COLUMNS: &str = "id, company_id, sku, name, unit, current_stock, opening_stock, \
     min_stock_level, standard_cost, track_batches, track_expiry, is_active, created_at, updated_at";

const GODOWN_COLUMNS: &str = "id, company_id, name, code, parent_id, is_default, is_active, created_at";

const BATCH_COLUMNS: &str =
    "id, company_id, product_id, batch_number, manufacture_date, expiry_date, quantity, created_at";

const ENTRY_COLUMNS: &str = "id, entry_no, company_id, product_id, godown_id, batch_id, quantity, \
     unit, rate, value, movement_kind, reference_type, reference_id, reference_number, narration, \
     entry_date, created_by";

const JOURNAL_COLUMNS: &str = "id, company_id, voucher_number, voucher_seq, fiscal_year, \
     journal_type, status, journal_date, source_godown_id, destination_godown_id, bom_id, \
     narration, additional_cost, created_by, created_at, confirmed_by, confirmed_at, \
     cancelled_by, cancelled_at, cancellation_reason, updated_at";

const ITEM_COLUMNS: &str = "id, journal_id, side, line_no, product_id, godown_id, batch_id, \
     quantity, unit, rate, value, stock_entry_id, reversal_entry_id";

const BOM_COLUMNS: &str =
    "id, company_id, name, finished_product_id, output_quantity, output_unit, is_active, created_at";

const COMPONENT_COLUMNS: &str = "id, bom_id, product_id, quantity, unit, waste_percent";

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    company_id: Uuid,
    sku: String,
    name: String,
    unit: String,
    current_stock: Decimal,
    opening_stock: Decimal,
    min_stock_level: Decimal,
    standard_cost: Decimal,
    track_batches: bool,
    track_expiry: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            company_id: row.company_id,
            sku: row.sku,
            name: row.name,
            unit: row.unit,
            current_stock: row.current_stock,
            opening_stock: row.opening_stock,
            min_stock_level: row.min_stock_level,
            standard_cost: row.standard_cost,
            track_batches: row.track_batches,
            track_expiry: row.track_expiry,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct GodownRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    code: Option<String>,
    parent_id: Option<Uuid>,
    is_default: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<GodownRow> for Godown {
    fn from(row: GodownRow) -> Self {
        Godown {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            code: row.code,
            parent_id: row.parent_id,
            is_default: row.is_default,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    company_id: Uuid,
    product_id: Uuid,
    batch_number: String,
    manufacture_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    quantity: Decimal,
    created_at: DateTime<Utc>,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            company_id: row.company_id,
            product_id: row.product_id,
            batch_number: row.batch_number,
            manufacture_date: row.manufacture_date,
            expiry_date: row.expiry_date,
            quantity: row.quantity,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: Uuid,
    entry_no: i64,
    company_id: Uuid,
    product_id: Uuid,
    godown_id: Uuid,
    batch_id: Option<Uuid>,
    quantity: Decimal,
    unit: String,
    rate: Decimal,
    value: Decimal,
    movement_kind: String,
    reference_type: String,
    reference_id: Option<Uuid>,
    reference_number: Option<String>,
    narration: Option<String>,
    entry_date: DateTime<Utc>,
    created_by: Option<Uuid>,
}

impl TryFrom<EntryRow> for StockEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let movement_kind = MovementKind::from_str(&row.movement_kind).ok_or_else(|| {
            AppError::Internal(format!("Unknown movement kind '{}'", row.movement_kind))
        })?;
        Ok(StockEntry {
            id: row.id,
            entry_no: row.entry_no,
            company_id: row.company_id,
            product_id: row.product_id,
            godown_id: row.godown_id,
            batch_id: row.batch_id,
            quantity: row.quantity,
            unit: row.unit,
            rate: row.rate,
            value: row.value,
            movement_kind,
            reference: StockReference::new(row.reference_type, row.reference_id, row.reference_number),
            narration: row.narration,
            entry_date: row.entry_date,
            created_by: row.created_by,
        })
    }
}

#[derive(Debug, FromRow)]
struct JournalRow {
    id: Uuid,
    company_id: Uuid,
    voucher_number: String,
    voucher_seq: i32,
    fiscal_year: i32,
    journal_type: String,
    status: String,
    journal_date: NaiveDate,
    source_godown_id: Option<Uuid>,
    destination_godown_id: Option<Uuid>,
    bom_id: Option<Uuid>,
    narration: Option<String>,
    additional_cost: Decimal,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    confirmed_by: Option<Uuid>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_by: Option<Uuid>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JournalRow> for StockJournal {
    type Error = AppError;

    fn try_from(row: JournalRow) -> Result<Self, Self::Error> {
        let journal_type = JournalType::from_str(&row.journal_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown journal type '{}'", row.journal_type))
        })?;
        let status = JournalStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown journal status '{}'", row.status)))?;
        Ok(StockJournal {
            id: row.id,
            company_id: row.company_id,
            voucher_number: row.voucher_number,
            voucher_seq: row.voucher_seq,
            fiscal_year: row.fiscal_year,
            journal_type,
            status,
            journal_date: row.journal_date,
            source_godown_id: row.source_godown_id,
            destination_godown_id: row.destination_godown_id,
            bom_id: row.bom_id,
            narration: row.narration,
            additional_cost: row.additional_cost,
            created_by: row.created_by,
            created_at: row.created_at,
            confirmed_by: row.confirmed_by,
            confirmed_at: row.confirmed_at,
            cancelled_by: row.cancelled_by,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    journal_id: Uuid,
    side: String,
    line_no: i32,
    product_id: Uuid,
    godown_id: Uuid,
    batch_id: Option<Uuid>,
    quantity: Decimal,
    unit: String,
    rate: Decimal,
    value: Decimal,
    stock_entry_id: Option<Uuid>,
    reversal_entry_id: Option<Uuid>,
}

impl TryFrom<ItemRow> for StockJournalItem {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let side = ItemSide::from_str(&row.side)
            .ok_or_else(|| AppError::Internal(format!("Unknown item side '{}'", row.side)))?;
        Ok(StockJournalItem {
            id: row.id,
            journal_id: row.journal_id,
            side,
            line_no: row.line_no,
            product_id: row.product_id,
            godown_id: row.godown_id,
            batch_id: row.batch_id,
            quantity: row.quantity,
            unit: row.unit,
            rate: row.rate,
            value: row.value,
            stock_entry_id: row.stock_entry_id,
            reversal_entry_id: row.reversal_entry_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct BomRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    finished_product_id: Uuid,
    output_quantity: Decimal,
    output_unit: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<BomRow> for BillOfMaterial {
    fn from(row: BomRow) -> Self {
        BillOfMaterial {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            finished_product_id: row.finished_product_id,
            output_quantity: row.output_quantity,
            output_unit: row.output_unit,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ComponentRow {
    id: Uuid,
    bom_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit: String,
    waste_percent: Decimal,
}

impl From<ComponentRow> for BomComponent {
    fn from(row: ComponentRow) -> Self {
        BomComponent {
            id: row.id,
            bom_id: row.bom_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit: row.unit,
            waste_percent: row.waste_percent,
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One PostgreSQL transaction; rolled back on drop unless committed
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, company_id, sku, name, unit, current_stock, opening_stock,
                min_stock_level, standard_cost, track_batches, track_expiry, is_active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(product.id)
        .bind(product.company_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(product.current_stock)
        .bind(product.opening_stock)
        .bind(product.min_stock_level)
        .bind(product.standard_cost)
        .bind(product.track_batches)
        .bind(product.track_expiry)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, "sku"))?;

        Ok(())
    }

    async fn get_product(&mut self, company_id: Uuid, product_id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND company_id = $2",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn list_products(&mut self, company_id: Uuid) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE company_id = $1 ORDER BY sku",
            PRODUCT_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn lock_products(&mut self, company_id: Uuid, product_ids: &[Uuid]) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE company_id = $1 AND id = ANY($2) ORDER BY id FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(company_id)
        .bind(product_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn set_product_active(&mut self, company_id: Uuid, product_id: Uuid, is_active: bool) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET is_active = $3, updated_at = NOW() \
             WHERE id = $1 AND company_id = $2 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(company_id)
        .bind(is_active)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn apply_product_delta(&mut self, product_id: Uuid, delta: Decimal) -> AppResult<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE products
            SET current_stock = current_stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING current_stock
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    async fn insert_godown(&mut self, godown: &Godown) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO godowns (id, company_id, name, code, parent_id, is_default, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(godown.id)
        .bind(godown.company_id)
        .bind(&godown.name)
        .bind(&godown.code)
        .bind(godown.parent_id)
        .bind(godown.is_default)
        .bind(godown.is_active)
        .bind(godown.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, "code"))?;

        Ok(())
    }

    async fn get_godown(&mut self, company_id: Uuid, godown_id: Uuid) -> AppResult<Option<Godown>> {
        let row = sqlx::query_as::<_, GodownRow>(&format!(
            "SELECT {} FROM godowns WHERE id = $1 AND company_id = $2",
            GODOWN_COLUMNS
        ))
        .bind(godown_id)
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Godown::from))
    }

    async fn list_godowns(&mut self, company_id: Uuid) -> AppResult<Vec<Godown>> {
        let rows = sqlx::query_as::<_, GodownRow>(&format!(
            "SELECT {} FROM godowns WHERE company_id = $1 ORDER BY name",
            GODOWN_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Godown::from).collect())
    }

    async fn default_godown(&mut self, company_id: Uuid) -> AppResult<Option<Godown>> {
        let row = sqlx::query_as::<_, GodownRow>(&format!(
            "SELECT {} FROM godowns WHERE company_id = $1 AND is_default AND is_active LIMIT 1",
            GODOWN_COLUMNS
        ))
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Godown::from))
    }

    async fn clear_default_godown(&mut self, company_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE godowns SET is_default = FALSE WHERE company_id = $1 AND is_default")
            .bind(company_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_batch(&mut self, batch: &Batch) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO batches (
                id, company_id, product_id, batch_number, manufacture_date, expiry_date,
                quantity, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(batch.id)
        .bind(batch.company_id)
        .bind(batch.product_id)
        .bind(&batch.batch_number)
        .bind(batch.manufacture_date)
        .bind(batch.expiry_date)
        .bind(batch.quantity)
        .bind(batch.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, "batch_number"))?;

        Ok(())
    }

    async fn get_batch(&mut self, company_id: Uuid, batch_id: Uuid) -> AppResult<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM batches WHERE id = $1 AND company_id = $2",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Batch::from))
    }

    async fn list_batches(&mut self, company_id: Uuid, product_id: Option<Uuid>) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {} FROM batches
            WHERE company_id = $1 AND ($2::uuid IS NULL OR product_id = $2)
            ORDER BY expiry_date NULLS LAST, batch_number
            "#,
            BATCH_COLUMNS
        ))
        .bind(company_id)
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Batch::from).collect())
    }

    async fn apply_batch_delta(&mut self, batch_id: Uuid, delta: Decimal) -> AppResult<Decimal> {
        sqlx::query_scalar::<_, Decimal>(
            "UPDATE batches SET quantity = quantity + $2 WHERE id = $1 RETURNING quantity",
        )
        .bind(batch_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    // ------------------------------------------------------------------
    // Movement ledger
    // ------------------------------------------------------------------

    async fn insert_entry(&mut self, entry: NewStockEntry) -> AppResult<StockEntry> {
        let entry_no = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO stock_entries (
                id, company_id, product_id, godown_id, batch_id, quantity, unit, rate, value,
                movement_kind, reference_type, reference_id, reference_number, narration,
                entry_date, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING entry_no
            "#,
        )
        .bind(entry.id)
        .bind(entry.company_id)
        .bind(entry.product_id)
        .bind(entry.godown_id)
        .bind(entry.batch_id)
        .bind(entry.quantity)
        .bind(&entry.unit)
        .bind(entry.rate)
        .bind(entry.value)
        .bind(entry.movement_kind.as_str())
        .bind(&entry.reference.reference_type)
        .bind(entry.reference.reference_id)
        .bind(&entry.reference.reference_number)
        .bind(&entry.narration)
        .bind(entry.entry_date)
        .bind(entry.created_by)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(entry.into_entry(entry_no))
    }

    async fn get_entry(&mut self, company_id: Uuid, entry_id: Uuid) -> AppResult<Option<StockEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM stock_entries WHERE id = $1 AND company_id = $2",
            ENTRY_COLUMNS
        ))
        .bind(entry_id)
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(StockEntry::try_from).transpose()
    }

    async fn list_entries(&mut self, filter: &EntryFilter) -> AppResult<Vec<StockEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {} FROM stock_entries
            WHERE company_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::uuid IS NULL OR godown_id = $3)
              AND ($4::timestamptz IS NULL OR entry_date >= $4)
              AND ($5::timestamptz IS NULL OR entry_date < $5)
            ORDER BY entry_date, entry_no
            "#,
            ENTRY_COLUMNS
        ))
        .bind(filter.company_id)
        .bind(filter.product_id)
        .bind(filter.godown_id)
        .bind(filter.from)
        .bind(filter.before)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(StockEntry::try_from).collect()
    }

    async fn sum_entries(&mut self, filter: &EntryFilter) -> AppResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0) FROM stock_entries
            WHERE company_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::uuid IS NULL OR godown_id = $3)
              AND ($4::timestamptz IS NULL OR entry_date >= $4)
              AND ($5::timestamptz IS NULL OR entry_date < $5)
            "#,
        )
        .bind(filter.company_id)
        .bind(filter.product_id)
        .bind(filter.godown_id)
        .bind(filter.from)
        .bind(filter.before)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(total)
    }

    // ------------------------------------------------------------------
    // Stock journals
    // ------------------------------------------------------------------

    async fn next_voucher_sequence(&mut self, company_id: Uuid, journal_type: JournalType, year: i32) -> AppResult<i32> {
        let seq = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO voucher_sequences (company_id, journal_type, fiscal_year, last_seq)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (company_id, journal_type, fiscal_year)
            DO UPDATE SET last_seq = voucher_sequences.last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(company_id)
        .bind(journal_type.as_str())
        .bind(year)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(seq)
    }

    async fn insert_journal(&mut self, journal: &StockJournal) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_journals (
                id, company_id, voucher_number, voucher_seq, fiscal_year, journal_type, status,
                journal_date, source_godown_id, destination_godown_id, bom_id, narration,
                additional_cost, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(journal.id)
        .bind(journal.company_id)
        .bind(&journal.voucher_number)
        .bind(journal.voucher_seq)
        .bind(journal.fiscal_year)
        .bind(journal.journal_type.as_str())
        .bind(journal.status.as_str())
        .bind(journal.journal_date)
        .bind(journal.source_godown_id)
        .bind(journal.destination_godown_id)
        .bind(journal.bom_id)
        .bind(&journal.narration)
        .bind(journal.additional_cost)
        .bind(journal.created_by)
        .bind(journal.created_at)
        .bind(journal.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, "voucher_number"))?;

        Ok(())
    }

    async fn update_journal(&mut self, journal: &StockJournal) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE stock_journals
            SET status = $2,
                source_godown_id = $3,
                destination_godown_id = $4,
                bom_id = $5,
                narration = $6,
                additional_cost = $7,
                confirmed_by = $8,
                confirmed_at = $9,
                cancelled_by = $10,
                cancelled_at = $11,
                cancellation_reason = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(journal.id)
        .bind(journal.status.as_str())
        .bind(journal.source_godown_id)
        .bind(journal.destination_godown_id)
        .bind(journal.bom_id)
        .bind(&journal.narration)
        .bind(journal.additional_cost)
        .bind(journal.confirmed_by)
        .bind(journal.confirmed_at)
        .bind(journal.cancelled_by)
        .bind(journal.cancelled_at)
        .bind(&journal.cancellation_reason)
        .bind(journal.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn get_journal(&mut self, company_id: Uuid, journal_id: Uuid) -> AppResult<Option<StockJournal>> {
        let row = sqlx::query_as::<_, JournalRow>(&format!(
            "SELECT {} FROM stock_journals WHERE id = $1 AND company_id = $2",
            JOURNAL_COLUMNS
        ))
        .bind(journal_id)
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(StockJournal::try_from).transpose()
    }

    async fn lock_journal(&mut self, company_id: Uuid, journal_id: Uuid) -> AppResult<Option<StockJournal>> {
        let row = sqlx::query_as::<_, JournalRow>(&format!(
            "SELECT {} FROM stock_journals WHERE id = $1 AND company_id = $2 FOR UPDATE",
            JOURNAL_COLUMNS
        ))
        .bind(journal_id)
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(StockJournal::try_from).transpose()
    }

    async fn list_journals(&mut self, company_id: Uuid, filter: &JournalFilter) -> AppResult<Vec<StockJournal>> {
        let rows = sqlx::query_as::<_, JournalRow>(&format!(
            r#"
            SELECT {} FROM stock_journals
            WHERE company_id = $1
              AND ($2::text IS NULL OR journal_type = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::date IS NULL OR journal_date >= $4)
              AND ($5::date IS NULL OR journal_date <= $5)
            ORDER BY journal_date DESC, voucher_number DESC
            LIMIT $6 OFFSET $7
            "#,
            JOURNAL_COLUMNS
        ))
        .bind(company_id)
        .bind(filter.journal_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(StockJournal::try_from).collect()
    }

    async fn delete_journal(&mut self, journal_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM stock_journals WHERE id = $1")
            .bind(journal_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_journal_items(&mut self, items: &[StockJournalItem]) -> AppResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO stock_journal_items (
                    id, journal_id, side, line_no, product_id, godown_id, batch_id,
                    quantity, unit, rate, value
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id)
            .bind(item.journal_id)
            .bind(item.side.as_str())
            .bind(item.line_no)
            .bind(item.product_id)
            .bind(item.godown_id)
            .bind(item.batch_id)
            .bind(item.quantity)
            .bind(&item.unit)
            .bind(item.rate)
            .bind(item.value)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn list_journal_items(&mut self, journal_id: Uuid) -> AppResult<Vec<StockJournalItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {} FROM stock_journal_items
            WHERE journal_id = $1
            ORDER BY CASE side WHEN 'source' THEN 0 ELSE 1 END, line_no
            "#,
            ITEM_COLUMNS
        ))
        .bind(journal_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(StockJournalItem::try_from).collect()
    }

    async fn delete_journal_items(&mut self, journal_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM stock_journal_items WHERE journal_id = $1")
            .bind(journal_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn set_item_entry(&mut self, item_id: Uuid, entry_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE stock_journal_items SET stock_entry_id = $2 WHERE id = $1")
            .bind(item_id)
            .bind(entry_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn set_item_reversal(&mut self, item_id: Uuid, entry_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE stock_journal_items SET reversal_entry_id = $2 WHERE id = $1")
            .bind(item_id)
            .bind(entry_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Bills of material
    // ------------------------------------------------------------------

    async fn insert_bom(&mut self, bom: &BillOfMaterial, components: &[BomComponent]) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bills_of_material (
                id, company_id, name, finished_product_id, output_quantity, output_unit,
                is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(bom.id)
        .bind(bom.company_id)
        .bind(&bom.name)
        .bind(bom.finished_product_id)
        .bind(bom.output_quantity)
        .bind(&bom.output_unit)
        .bind(bom.is_active)
        .bind(bom.created_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, component) in components.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO bom_components (id, bom_id, product_id, quantity, unit, waste_percent, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(component.id)
            .bind(component.bom_id)
            .bind(component.product_id)
            .bind(component.quantity)
            .bind(&component.unit)
            .bind(component.waste_percent)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn get_bom(&mut self, company_id: Uuid, bom_id: Uuid) -> AppResult<Option<BillOfMaterial>> {
        let row = sqlx::query_as::<_, BomRow>(&format!(
            "SELECT {} FROM bills_of_material WHERE id = $1 AND company_id = $2",
            BOM_COLUMNS
        ))
        .bind(bom_id)
        .bind(company_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(BillOfMaterial::from))
    }

    async fn list_boms(&mut self, company_id: Uuid) -> AppResult<Vec<BillOfMaterial>> {
        let rows = sqlx::query_as::<_, BomRow>(&format!(
            "SELECT {} FROM bills_of_material WHERE company_id = $1 ORDER BY name",
            BOM_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(BillOfMaterial::from).collect())
    }

    async fn set_bom_active(&mut self, company_id: Uuid, bom_id: Uuid, is_active: bool) -> AppResult<Option<BillOfMaterial>> {
        let row = sqlx::query_as::<_, BomRow>(&format!(
            "UPDATE bills_of_material SET is_active = $3 WHERE id = $1 AND company_id = $2 RETURNING {}",
            BOM_COLUMNS
        ))
        .bind(bom_id)
        .bind(company_id)
        .bind(is_active)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(BillOfMaterial::from))
    }

    async fn list_bom_components(&mut self, bom_id: Uuid) -> AppResult<Vec<BomComponent>> {
        let rows = sqlx::query_as::<_, ComponentRow>(&format!(
            "SELECT {} FROM bom_components WHERE bom_id = $1 ORDER BY position",
            COMPONENT_COLUMNS
        ))
        .bind(bom_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(BomComponent::from).collect())
    }

    // ------------------------------------------------------------------

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
