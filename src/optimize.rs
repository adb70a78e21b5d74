use crate::models::{CellValue, ProductSet, ShopifyProduct, WooProduct, cell_text};
use serde::Serialize;
use std::collections::HashSet;

/// The trimmed WooCommerce projection sent to the generation service.
/// Only the columns that inform marketing copy survive; attribute
/// name/value pairs are folded into single strings. Prices keep their
/// cell form so the payload shows them as the merchant entered them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptimizedWooProduct {
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(rename = "Regular price", skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<CellValue>,
    #[serde(rename = "Sale price", skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<CellValue>,
    #[serde(rename = "Categories", skip_serializing_if = "Option::is_none")]
    pub categories: Option<String>,
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(rename = "Images", skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
    #[serde(rename = "GTIN", skip_serializing_if = "Option::is_none")]
    pub gtin: Option<String>,
    #[serde(rename = "Attributes", skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptimizedShopifyProduct {
    #[serde(rename = "Handle")]
    pub handle: String,
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Vendor", skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(rename = "Product Category", skip_serializing_if = "Option::is_none")]
    pub product_category: Option<String>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(rename = "Price", skip_serializing_if = "Option::is_none")]
    pub price: Option<CellValue>,
    #[serde(rename = "Compare At Price", skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<CellValue>,
    #[serde(rename = "Images", skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
    #[serde(rename = "Barcode", skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(rename = "Options", skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum OptimizedBatch {
    WooCommerce(Vec<OptimizedWooProduct>),
    Shopify(Vec<OptimizedShopifyProduct>),
}

impl OptimizedBatch {
    pub fn len(&self) -> usize {
        match self {
            OptimizedBatch::WooCommerce(rows) => rows.len(),
            OptimizedBatch::Shopify(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Project a batch down to the fields the generation prompt needs.
/// WooCommerce variation rows are dropped (copy is written per parent);
/// Shopify variant rows collapse to the first row per Handle.
pub fn optimize_for_generation(products: &ProductSet) -> OptimizedBatch {
    match products {
        ProductSet::WooCommerce(rows) => OptimizedBatch::WooCommerce(
            rows.iter()
                .filter(|row| !row.is_variation())
                .map(optimize_woo)
                .collect(),
        ),
        ProductSet::Shopify(rows) => {
            let mut seen = HashSet::new();
            OptimizedBatch::Shopify(
                rows.iter()
                    .filter(|row| {
                        let handle = row.handle_text().unwrap_or_default();
                        seen.insert(handle)
                    })
                    .map(optimize_shopify)
                    .collect(),
            )
        }
    }
}

fn optimize_woo(product: &WooProduct) -> OptimizedWooProduct {
    let attributes = [
        (&product.attribute1_name, &product.attribute1_values),
        (&product.attribute2_name, &product.attribute2_values),
        (&product.attribute3_name, &product.attribute3_values),
    ]
    .into_iter()
    .filter_map(|(name, values)| match (cell_text(name), cell_text(values)) {
        (Some(name), Some(values)) => Some(format!("{name}: {values}")),
        _ => None,
    })
    .collect();

    OptimizedWooProduct {
        sku: product.sku_text().unwrap_or_default(),
        name: cell_text(&product.name),
        product_type: cell_text(&product.product_type),
        regular_price: filled(&product.regular_price),
        sale_price: filled(&product.sale_price),
        categories: cell_text(&product.categories),
        tags: cell_text(&product.tags),
        images: cell_text(&product.images),
        gtin: cell_text(&product.gtin),
        attributes,
    }
}

fn filled(cell: &Option<CellValue>) -> Option<CellValue> {
    cell.clone().filter(|value| !value.is_blank())
}

fn optimize_shopify(product: &ShopifyProduct) -> OptimizedShopifyProduct {
    let options = [
        (&product.option1_name, &product.option1_value),
        (&product.option2_name, &product.option2_value),
        (&product.option3_name, &product.option3_value),
    ]
    .into_iter()
    .filter_map(|(name, value)| match (cell_text(name), cell_text(value)) {
        (Some(name), Some(value)) => Some(format!("{name}: {value}")),
        _ => None,
    })
    .collect();

    OptimizedShopifyProduct {
        handle: product.handle_text().unwrap_or_default(),
        title: cell_text(&product.title),
        vendor: cell_text(&product.vendor),
        product_category: cell_text(&product.product_category),
        product_type: cell_text(&product.product_type),
        tags: cell_text(&product.tags),
        price: filled(&product.variant_price),
        compare_at_price: filled(&product.variant_compare_at_price),
        images: cell_text(&product.image_src),
        barcode: cell_text(&product.variant_barcode),
        options,
    }
}

/// Rough token estimate (4 chars per token) of what the projection saves
/// versus shipping the raw rows. Logged per batch, never load-bearing.
pub fn estimate_token_savings(full: &ProductSet, optimized: &OptimizedBatch) -> i64 {
    let full_len = serde_json::to_string(full).map(|s| s.len()).unwrap_or(0);
    let slim_len = serde_json::to_string(optimized)
        .map(|s| s.len())
        .unwrap_or(0);
    (full_len as i64 - slim_len as i64) / 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn woo_rows(rows: serde_json::Value) -> ProductSet {
        ProductSet::WooCommerce(serde_json::from_value(rows).unwrap())
    }

    #[test]
    fn variations_are_excluded_from_the_payload() {
        let set = woo_rows(json!([
            {"Type": "variable", "SKU": "parent", "Name": "Shirt"},
            {"Type": "variation", "SKU": "child-s", "Parent": "parent"},
            {"Type": "simple", "SKU": "mug", "Name": "Mug"},
        ]));
        let batch = optimize_for_generation(&set);
        let OptimizedBatch::WooCommerce(rows) = batch else {
            panic!("expected woocommerce batch");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sku, "parent");
        assert_eq!(rows[1].sku, "mug");
    }

    #[test]
    fn attributes_fold_into_name_value_strings() {
        let set = woo_rows(json!([{
            "Type": "simple",
            "SKU": "tee",
            "Name": "Tee",
            "Attribute 1 name": "Color",
            "Attribute 1 value(s)": "Red, Blue",
            "Attribute 2 name": "Size",
        }]));
        let OptimizedBatch::WooCommerce(rows) = optimize_for_generation(&set) else {
            panic!("expected woocommerce batch");
        };
        // attribute 2 has no values, so only attribute 1 survives
        assert_eq!(rows[0].attributes, vec!["Color: Red, Blue"]);
    }

    #[test]
    fn shopify_variant_rows_collapse_to_first_handle() {
        let set = ProductSet::Shopify(
            serde_json::from_value(json!([
                {"Handle": "tee", "Title": "Tee", "Variant Price": 18,
                 "Option1 Name": "Size", "Option1 Value": "S"},
                {"Handle": "tee", "Variant Price": 18, "Option1 Value": "M"},
                {"Handle": "mug", "Title": "Mug"},
            ]))
            .unwrap(),
        );
        let OptimizedBatch::Shopify(rows) = optimize_for_generation(&set) else {
            panic!("expected shopify batch");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].handle, "tee");
        assert_eq!(rows[0].title.as_deref(), Some("Tee"));
        assert_eq!(rows[0].options, vec!["Size: S"]);
        assert_eq!(rows[1].handle, "mug");

        let payload = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(payload["Price"], json!(18));
    }

    #[test]
    fn pricing_and_identifiers_reach_the_payload() {
        let set = woo_rows(json!([{
            "Type": "simple",
            "SKU": "mug",
            "Name": "Mug",
            "Regular price": 12,
            "Sale price": "9.99",
            "Images": "https://example.com/mug.jpg",
            "GTIN, UPC, EAN, or ISBN": "12345678",
        }]));
        let batch = optimize_for_generation(&set);
        let payload = serde_json::to_value(&batch).unwrap();
        let row = &payload[0];
        assert_eq!(row["Regular price"], json!(12));
        assert_eq!(row["Sale price"], "9.99");
        assert_eq!(row["Images"], "https://example.com/mug.jpg");
        assert_eq!(row["GTIN"], "12345678");
        // columns the prompt never reads stay out of the payload
        assert!(row.get("Weight (kg)").is_none());
    }

    #[test]
    fn projection_never_grows_the_payload() {
        let set = woo_rows(json!([{
            "Type": "simple",
            "SKU": "mug",
            "Name": "Mug",
            "Regular price": 12,
            "Description": "A very long existing description that the model does not need to see",
            "Images": "https://example.com/a.jpg, https://example.com/b.jpg",
        }]));
        let batch = optimize_for_generation(&set);
        assert!(estimate_token_savings(&set, &batch) > 0);
    }
}
