//! Fixtures shared by the integration tests
//!
//! Every test gets its own in-memory store and company.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{Godown, Product};
use stock_ledger::services::catalog::{CreateGodownInput, CreateProductInput};
use stock_ledger::services::movement::RecordMovementInput;
use stock_ledger::services::{CatalogService, MovementService};
use stock_ledger::{LedgerStore, MemoryLedgerStore};
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub struct Fixture {
    pub store: Arc<dyn LedgerStore>,
    pub company_id: Uuid,
    pub user_id: Uuid,
    /// Company default godown
    pub main: Godown,
    pub branch: Godown,
}

impl Fixture {
    pub async fn new() -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let company_id = Uuid::new_v4();
        let catalog = CatalogService::new(store.clone());

        let main = catalog
            .create_godown(company_id, godown_input("Main Warehouse", "MAIN", true))
            .await
            .unwrap();
        let branch = catalog
            .create_godown(company_id, godown_input("Branch Store", "BR01", false))
            .await
            .unwrap();

        Self {
            store,
            company_id,
            user_id: Uuid::new_v4(),
            main,
            branch,
        }
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.store.clone())
    }

    pub fn movements(&self) -> MovementService {
        MovementService::new(self.store.clone())
    }

    /// Product with no opening stock
    pub async fn product(&self, sku: &str, standard_cost: &str) -> Product {
        self.catalog()
            .create_product(self.company_id, product_input(sku, None, standard_cost))
            .await
            .unwrap()
    }

    /// Receive `quantity` of a product into a godown as a purchase
    pub async fn receive(&self, product_id: Uuid, godown_id: Uuid, quantity: &str, rate: &str) {
        self.movements()
            .record_in(
                self.company_id,
                Some(self.user_id),
                purchase(product_id, godown_id, quantity, rate),
            )
            .await
            .unwrap();
    }

    /// Current cached stock of a product
    pub async fn stock(&self, product_id: Uuid) -> Decimal {
        self.catalog()
            .get_product(self.company_id, product_id)
            .await
            .unwrap()
            .current_stock
    }
}

pub fn godown_input(name: &str, code: &str, is_default: bool) -> CreateGodownInput {
    CreateGodownInput {
        name: name.to_string(),
        code: Some(code.to_string()),
        parent_id: None,
        is_default,
    }
}

pub fn product_input(sku: &str, opening_stock: Option<&str>, standard_cost: &str) -> CreateProductInput {
    CreateProductInput {
        sku: sku.to_string(),
        name: format!("Product {}", sku),
        unit: "kg".to_string(),
        opening_stock: opening_stock.map(dec),
        min_stock_level: None,
        standard_cost: Some(dec(standard_cost)),
        track_batches: None,
        track_expiry: None,
    }
}

pub fn purchase(product_id: Uuid, godown_id: Uuid, quantity: &str, rate: &str) -> RecordMovementInput {
    RecordMovementInput {
        product_id,
        godown_id,
        batch_id: None,
        quantity: dec(quantity),
        rate: Some(dec(rate)),
        movement_kind: shared::MovementKind::Purchase,
        reference_type: "purchase_invoice".to_string(),
        reference_id: Some(Uuid::new_v4()),
        reference_number: Some("PI-0001".to_string()),
        narration: None,
        entry_date: None,
    }
}

pub fn sale(product_id: Uuid, godown_id: Uuid, quantity: &str) -> RecordMovementInput {
    RecordMovementInput {
        product_id,
        godown_id,
        batch_id: None,
        quantity: dec(quantity),
        rate: None,
        movement_kind: shared::MovementKind::Sale,
        reference_type: "sales_invoice".to_string(),
        reference_id: Some(Uuid::new_v4()),
        reference_number: Some("SI-0001".to_string()),
        narration: None,
        entry_date: None,
    }
}
