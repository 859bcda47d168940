//! Bill of materials models and the expansion rule

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A recipe producing `output_quantity` of one finished product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterial {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub finished_product_id: Uuid,
    pub output_quantity: Decimal,
    pub output_unit: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One ingredient of a BOM, quantified per `BillOfMaterial::output_quantity`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomComponent {
    pub id: Uuid,
    pub bom_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    /// Extra consumption allowance, in percent (>= 0)
    pub waste_percent: Decimal,
}

/// BOM header with components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillOfMaterialWithComponents {
    #[serde(flatten)]
    pub bom: BillOfMaterial,
    pub components: Vec<BomComponent>,
}

/// Quantity of one component needed for a requested output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRequirement {
    pub product_id: Uuid,
    pub unit: String,
    /// Scaled quantity before the waste allowance
    pub base_quantity: Decimal,
    pub waste_percent: Decimal,
    pub required_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BomError {
    #[error("BOM output quantity must be positive")]
    NonPositiveOutput,

    #[error("BOM has no components")]
    NoComponents,

    #[error("Requested output quantity must be positive")]
    NonPositiveRequest,

    #[error("Component {0} has a negative waste percentage")]
    NegativeWaste(Uuid),

    #[error("Requested output quantity is out of range")]
    OutOfRange,
}

/// Expand a BOM into component requirements for `output_quantity` of output.
///
/// `required = quantity x (output_quantity / bom.output_quantity) x (1 + waste / 100)`
pub fn expand_components(
    bom: &BillOfMaterial,
    components: &[BomComponent],
    output_quantity: Decimal,
) -> Result<Vec<ComponentRequirement>, BomError> {
    if bom.output_quantity <= Decimal::ZERO {
        return Err(BomError::NonPositiveOutput);
    }
    if components.is_empty() {
        return Err(BomError::NoComponents);
    }
    if output_quantity <= Decimal::ZERO {
        return Err(BomError::NonPositiveRequest);
    }

    let scale = output_quantity
        .checked_div(bom.output_quantity)
        .ok_or(BomError::OutOfRange)?;
    let hundred = Decimal::ONE_HUNDRED;

    components
        .iter()
        .map(|component| {
            if component.waste_percent < Decimal::ZERO {
                return Err(BomError::NegativeWaste(component.id));
            }
            let base_quantity = component
                .quantity
                .checked_mul(scale)
                .ok_or(BomError::OutOfRange)?;
            let required_quantity = (component.waste_percent / hundred)
                .checked_add(Decimal::ONE)
                .and_then(|factor| base_quantity.checked_mul(factor))
                .ok_or(BomError::OutOfRange)?;
            Ok(ComponentRequirement {
                product_id: component.product_id,
                unit: component.unit.clone(),
                base_quantity,
                waste_percent: component.waste_percent,
                required_quantity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bom(output: Decimal) -> BillOfMaterial {
        BillOfMaterial {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "Masala chai 1kg".to_string(),
            finished_product_id: Uuid::new_v4(),
            output_quantity: output,
            output_unit: "kg".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn component(bom_id: Uuid, quantity: Decimal, waste: Decimal) -> BomComponent {
        BomComponent {
            id: Uuid::new_v4(),
            bom_id,
            product_id: Uuid::new_v4(),
            quantity,
            unit: "kg".to_string(),
            waste_percent: waste,
        }
    }

    #[test]
    fn test_expand_applies_scale_and_waste() {
        let b = bom(Decimal::from(10));
        let comps = vec![
            component(b.id, Decimal::from(8), Decimal::from(5)),
            component(b.id, Decimal::from(2), Decimal::ZERO),
        ];

        let req = expand_components(&b, &comps, Decimal::from(25)).unwrap();

        // 8 x 2.5 = 20, +5% = 21
        assert_eq!(req[0].base_quantity, Decimal::from(20));
        assert_eq!(req[0].required_quantity, Decimal::from(21));
        assert_eq!(req[1].required_quantity, Decimal::from(5));
    }

    #[test]
    fn test_expand_rejects_bad_boms() {
        let b = bom(Decimal::ZERO);
        let comps = vec![component(b.id, Decimal::ONE, Decimal::ZERO)];
        assert_eq!(
            expand_components(&b, &comps, Decimal::ONE),
            Err(BomError::NonPositiveOutput)
        );

        let b = bom(Decimal::ONE);
        assert_eq!(expand_components(&b, &[], Decimal::ONE), Err(BomError::NoComponents));
        assert_eq!(
            expand_components(&b, &comps, Decimal::ZERO),
            Err(BomError::NonPositiveRequest)
        );
    }

    #[test]
    fn test_expand_out_of_range_is_an_error() {
        let b = bom(Decimal::new(1, 6));
        let comps = vec![component(b.id, Decimal::from(1_000_000), Decimal::ZERO)];

        assert_eq!(
            expand_components(&b, &comps, Decimal::MAX),
            Err(BomError::OutOfRange)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_expansion_scales_linearly(
            output in 1i64..=1000,
            k in 1i64..=50,
            quantities in prop::collection::vec((1i64..=10000, 0i64..=500), 1..6)
        ) {
            let b = bom(Decimal::new(output, 1));
            let comps: Vec<BomComponent> = quantities
                .iter()
                .map(|(q, w)| component(b.id, Decimal::new(*q, 2), Decimal::new(*w, 1)))
                .collect();

            let single = expand_components(&b, &comps, b.output_quantity).unwrap();
            let scaled = expand_components(&b, &comps, b.output_quantity * Decimal::from(k)).unwrap();

            for (one, many) in single.iter().zip(scaled.iter()) {
                prop_assert_eq!(many.base_quantity, one.base_quantity * Decimal::from(k));
                prop_assert!(many.required_quantity >= many.base_quantity);
            }
        }
    }
}
