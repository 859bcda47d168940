//! Bill of material tests
//!
//! BOM creation rules, expansion with waste allowance and production
//! journals built from a BOM.

mod common;

use common::{dec, Fixture};
use proptest::prelude::*;
use shared::{JournalStatus, JournalType, MovementKind};
use stock_ledger::services::bom::{BomComponentInput, CreateBomInput};
use stock_ledger::services::quick_journal::BomProductionInput;
use stock_ledger::services::{BomService, QuickJournalService};
use stock_ledger::AppError;
use uuid::Uuid;

fn component(product_id: Uuid, quantity: &str, waste: Option<&str>) -> BomComponentInput {
    BomComponentInput {
        product_id,
        quantity: dec(quantity),
        unit: None,
        waste_percent: waste.map(dec),
    }
}

struct Blend {
    fx: Fixture,
    arabica: Uuid,
    robusta: Uuid,
    espresso: Uuid,
    bom_id: Uuid,
}

/// 10 kg espresso blend from 7 kg arabica (2% waste) and 3 kg robusta
async fn blend() -> Blend {
    let fx = Fixture::new().await;
    let arabica = fx.product("GB-ARA", "120").await.id;
    let robusta = fx.product("GB-ROB", "60").await.id;
    let espresso = fx.product("RB-ESP", "0").await.id;

    let bom = BomService::new(fx.store.clone())
        .create_bom(
            fx.company_id,
            CreateBomInput {
                name: "Espresso Blend".to_string(),
                finished_product_id: espresso,
                output_quantity: dec("10"),
                output_unit: None,
                components: vec![
                    component(arabica, "7", Some("2")),
                    component(robusta, "3", None),
                ],
            },
        )
        .await
        .unwrap();

    Blend {
        fx,
        arabica,
        robusta,
        espresso,
        bom_id: bom.bom.id,
    }
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_bom_keeps_component_order() {
    let b = blend().await;
    let bom = BomService::new(b.fx.store.clone())
        .get_bom(b.fx.company_id, b.bom_id)
        .await
        .unwrap();

    assert_eq!(bom.bom.output_unit, "kg");
    assert!(bom.bom.is_active);
    assert_eq!(bom.components.len(), 2);
    assert_eq!(bom.components[0].product_id, b.arabica);
    assert_eq!(bom.components[0].waste_percent, dec("2"));
    assert_eq!(bom.components[1].product_id, b.robusta);
    assert_eq!(bom.components[1].waste_percent, dec("0"));

    let boms = BomService::new(b.fx.store.clone())
        .list_boms(b.fx.company_id)
        .await
        .unwrap();
    assert_eq!(boms.len(), 1);
}

#[tokio::test]
async fn test_create_bom_rejects_self_consumption() {
    let fx = Fixture::new().await;
    let espresso = fx.product("RB-ESP", "0").await.id;

    let err = BomService::new(fx.store.clone())
        .create_bom(
            fx.company_id,
            CreateBomInput {
                name: "Loop".to_string(),
                finished_product_id: espresso,
                output_quantity: dec("1"),
                output_unit: None,
                components: vec![component(espresso, "1", None)],
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "components.product_id"));
}

#[tokio::test]
async fn test_create_bom_requires_components() {
    let fx = Fixture::new().await;
    let espresso = fx.product("RB-ESP", "0").await.id;

    let err = BomService::new(fx.store.clone())
        .create_bom(
            fx.company_id,
            CreateBomInput {
                name: "Empty".to_string(),
                finished_product_id: espresso,
                output_quantity: dec("1"),
                output_unit: None,
                components: Vec::new(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "components"));
}

#[tokio::test]
async fn test_create_bom_rejects_negative_waste() {
    let fx = Fixture::new().await;
    let espresso = fx.product("RB-ESP", "0").await.id;
    let arabica = fx.product("GB-ARA", "120").await.id;

    let err = BomService::new(fx.store.clone())
        .create_bom(
            fx.company_id,
            CreateBomInput {
                name: "Bad waste".to_string(),
                finished_product_id: espresso,
                output_quantity: dec("1"),
                output_unit: None,
                components: vec![component(arabica, "1", Some("-1"))],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "components.waste_percent"));
}

#[tokio::test]
async fn test_waste_above_hundred_percent_is_allowed() {
    let fx = Fixture::new().await;
    let cold_brew = fx.product("CB-001", "0").await.id;
    let grounds = fx.product("GB-GRD", "90").await.id;
    let service = BomService::new(fx.store.clone());

    let bom = service
        .create_bom(
            fx.company_id,
            CreateBomInput {
                name: "Cold brew concentrate".to_string(),
                finished_product_id: cold_brew,
                output_quantity: dec("1"),
                output_unit: None,
                components: vec![component(grounds, "2", Some("150"))],
            },
        )
        .await
        .unwrap();
    assert_eq!(bom.components[0].waste_percent, dec("150"));

    let expansion = service
        .expand_bom(fx.company_id, bom.bom.id, dec("4"))
        .await
        .unwrap();
    // 2 x 4 = 8, +150% = 20
    assert_eq!(expansion.components[0].base_quantity, dec("8"));
    assert_eq!(expansion.components[0].required_quantity, dec("20"));
}

// ============================================================================
// Expansion
// ============================================================================

#[tokio::test]
async fn test_expand_scales_and_applies_waste() {
    let b = blend().await;

    let expansion = BomService::new(b.fx.store.clone())
        .expand_bom(b.fx.company_id, b.bom_id, dec("25"))
        .await
        .unwrap();

    assert_eq!(expansion.finished_product_id, b.espresso);
    assert_eq!(expansion.output_quantity, dec("25"));
    assert_eq!(expansion.components.len(), 2);

    let arabica = &expansion.components[0];
    assert_eq!(arabica.product_id, b.arabica);
    assert_eq!(arabica.base_quantity, dec("17.5"));
    assert_eq!(arabica.required_quantity, dec("17.85"));

    let robusta = &expansion.components[1];
    assert_eq!(robusta.base_quantity, dec("7.5"));
    assert_eq!(robusta.required_quantity, dec("7.5"));
}

#[tokio::test]
async fn test_expand_rejects_non_positive_request() {
    let b = blend().await;

    let err = BomService::new(b.fx.store.clone())
        .expand_bom(b.fx.company_id, b.bom_id, dec("0"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "output_quantity"));
}

#[tokio::test]
async fn test_expand_unknown_bom() {
    let b = blend().await;

    let err = BomService::new(b.fx.store.clone())
        .expand_bom(Uuid::new_v4(), b.bom_id, dec("1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_expand_with_inactive_component_is_invalid() {
    let b = blend().await;
    let service = BomService::new(b.fx.store.clone());

    b.fx.catalog()
        .set_product_active(b.fx.company_id, b.robusta, false)
        .await
        .unwrap();
    let err = service
        .expand_bom(b.fx.company_id, b.bom_id, dec("10"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidBom(ref message) if message.contains(&b.robusta.to_string())));

    b.fx.catalog()
        .set_product_active(b.fx.company_id, b.robusta, true)
        .await
        .unwrap();
    assert!(service.expand_bom(b.fx.company_id, b.bom_id, dec("10")).await.is_ok());
}

#[tokio::test]
async fn test_expand_with_inactive_finished_product_is_invalid() {
    let b = blend().await;

    b.fx.catalog()
        .set_product_active(b.fx.company_id, b.espresso, false)
        .await
        .unwrap();
    let err = BomService::new(b.fx.store.clone())
        .expand_bom(b.fx.company_id, b.bom_id, dec("10"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidBom(_)));
}

#[tokio::test]
async fn test_inactive_bom_cannot_be_expanded_or_produced() {
    let b = blend().await;
    let fx = &b.fx;
    fx.receive(b.arabica, fx.main.id, "20", "120").await;
    fx.receive(b.robusta, fx.main.id, "10", "60").await;

    let bom = BomService::new(fx.store.clone())
        .set_bom_active(fx.company_id, b.bom_id, false)
        .await
        .unwrap();
    assert!(!bom.is_active);

    let err = BomService::new(fx.store.clone())
        .expand_bom(fx.company_id, b.bom_id, dec("10"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidBom(_)));

    let err = QuickJournalService::new(fx.store.clone())
        .bom_production(
            fx.company_id,
            None,
            BomProductionInput {
                bom_id: b.bom_id,
                output_quantity: dec("10"),
                source_godown_id: fx.main.id,
                destination_godown_id: None,
                output_rate: None,
                additional_cost: None,
                journal_date: None,
                narration: None,
                auto_confirm: true,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidBom(_)));
    assert_eq!(fx.stock(b.arabica).await, dec("20"));
}

#[tokio::test]
async fn test_set_bom_active_unknown_bom() {
    let fx = Fixture::new().await;

    let err = BomService::new(fx.store.clone())
        .set_bom_active(fx.company_id, Uuid::new_v4(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_expand_out_of_range_request() {
    let fx = Fixture::new().await;
    let sample = fx.product("SMP-001", "0").await.id;
    let beans = fx.product("GB-ARA", "120").await.id;
    let service = BomService::new(fx.store.clone());

    let bom = service
        .create_bom(
            fx.company_id,
            CreateBomInput {
                name: "Sample pack".to_string(),
                finished_product_id: sample,
                output_quantity: dec("0.001"),
                output_unit: None,
                components: vec![component(beans, "100", None)],
            },
        )
        .await
        .unwrap();

    let err = service
        .expand_bom(fx.company_id, bom.bom.id, rust_decimal::Decimal::MAX)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "output_quantity"));
}

// ============================================================================
// Production
// ============================================================================

#[tokio::test]
async fn test_bom_production_consumes_components() {
    let b = blend().await;
    let fx = &b.fx;
    fx.receive(b.arabica, fx.main.id, "20", "120").await;
    fx.receive(b.robusta, fx.main.id, "10", "60").await;

    let journal = QuickJournalService::new(fx.store.clone())
        .bom_production(
            fx.company_id,
            Some(fx.user_id),
            BomProductionInput {
                bom_id: b.bom_id,
                output_quantity: dec("25"),
                source_godown_id: fx.main.id,
                destination_godown_id: Some(fx.branch.id),
                output_rate: Some(dec("110")),
                additional_cost: None,
                journal_date: None,
                narration: None,
                auto_confirm: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(journal.journal.journal_type, JournalType::Manufacturing);
    assert_eq!(journal.journal.status, JournalStatus::Confirmed);
    assert_eq!(journal.journal.bom_id, Some(b.bom_id));
    assert!(journal.journal.narration.as_deref().unwrap_or_default().contains("Espresso Blend"));
    assert_eq!(journal.source_items.len(), 2);
    assert_eq!(journal.destination_items.len(), 1);
    assert_eq!(journal.destination_items[0].godown_id, fx.branch.id);

    assert_eq!(fx.stock(b.arabica).await, dec("2.15"));
    assert_eq!(fx.stock(b.robusta).await, dec("2.5"));
    assert_eq!(fx.stock(b.espresso).await, dec("25"));

    let entry_id = journal.destination_items[0].stock_entry_id.unwrap();
    let entry = fx.movements().get_entry(fx.company_id, entry_id).await.unwrap();
    assert_eq!(entry.movement_kind, MovementKind::ManufacturingIn);
    assert_eq!(entry.rate, dec("110"));
}

#[tokio::test]
async fn test_bom_production_short_component_keeps_draft() {
    let b = blend().await;
    let fx = &b.fx;
    fx.receive(b.arabica, fx.main.id, "20", "120").await;
    fx.receive(b.robusta, fx.main.id, "5", "60").await;

    let err = QuickJournalService::new(fx.store.clone())
        .bom_production(
            fx.company_id,
            None,
            BomProductionInput {
                bom_id: b.bom_id,
                output_quantity: dec("25"),
                source_godown_id: fx.main.id,
                destination_godown_id: None,
                output_rate: None,
                additional_cost: None,
                journal_date: None,
                narration: None,
                auto_confirm: true,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { product_id, .. } if product_id == b.robusta));
    assert_eq!(fx.stock(b.arabica).await, dec("20"));
    assert_eq!(fx.stock(b.espresso).await, dec("0"));

    let drafts = stock_ledger::services::StockJournalService::new(fx.store.clone())
        .list_journals(
            fx.company_id,
            stock_ledger::services::stock_journal::ListJournalsQuery {
                status: Some(JournalStatus::Draft),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Required quantity grows linearly with the requested output
    #[test]
    fn prop_expansion_is_linear(output in 1u32..500, factor in 2u32..5) {
        tokio_test::block_on(async {
            let b = blend().await;
            let service = BomService::new(b.fx.store.clone());

            let single = service
                .expand_bom(b.fx.company_id, b.bom_id, output.into())
                .await
                .unwrap();
            let scaled = service
                .expand_bom(b.fx.company_id, b.bom_id, (output * factor).into())
                .await
                .unwrap();

            for (one, many) in single.components.iter().zip(&scaled.components) {
                prop_assert_eq!(one.required_quantity * rust_decimal::Decimal::from(factor), many.required_quantity);
                prop_assert!(one.required_quantity >= one.base_quantity);
            }
            Ok(())
        })?;
    }
}
