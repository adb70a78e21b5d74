use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    WooCommerce,
    Shopify,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::WooCommerce => "woocommerce",
            Platform::Shopify => "shopify",
        }
    }
}

/// A single CSV-shaped cell. Exports produce numbers and strings
/// interchangeably ("10" vs 10), so both are accepted on input. Numbers
/// keep their `serde_json::Number` form so an untouched cell serializes
/// back byte-identical (an integer never becomes a float).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Number(Number),
    Bool(bool),
    Text(String),
}

impl CellValue {
    pub fn text(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Text(s) => s.trim().to_string(),
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => n.as_f64(),
            CellValue::Bool(_) => None,
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn from_text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }
}

/// A filled (non-blank) cell rendered as trimmed text, or `None`.
pub fn cell_text(cell: &Option<CellValue>) -> Option<String> {
    cell.as_ref()
        .filter(|value| !value.is_blank())
        .map(CellValue::text)
}

pub fn cell_number(cell: &Option<CellValue>) -> Option<f64> {
    cell.as_ref()
        .filter(|value| !value.is_blank())
        .and_then(CellValue::number)
}

pub fn cell_is_blank(cell: &Option<CellValue>) -> bool {
    cell.as_ref().map(CellValue::is_blank).unwrap_or(true)
}

/// One WooCommerce export row. Columns the pipeline reads or writes are
/// typed; everything else rides in `extra` untouched so a merged record
/// serializes with every original column intact.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WooProduct {
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<CellValue>,
    #[serde(rename = "SKU", default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<CellValue>,
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CellValue>,
    #[serde(
        rename = "Regular price",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub regular_price: Option<CellValue>,
    #[serde(rename = "Sale price", default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<CellValue>,
    #[serde(
        rename = "Date sale price starts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sale_price_starts: Option<CellValue>,
    #[serde(
        rename = "Date sale price ends",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sale_price_ends: Option<CellValue>,
    #[serde(rename = "Tax class", default, skip_serializing_if = "Option::is_none")]
    pub tax_class: Option<CellValue>,
    #[serde(
        rename = "GTIN, UPC, EAN, or ISBN",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gtin: Option<CellValue>,
    #[serde(
        rename = "Weight (kg)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub weight_kg: Option<CellValue>,
    #[serde(rename = "Weight (g)", default, skip_serializing_if = "Option::is_none")]
    pub weight_g: Option<CellValue>,
    #[serde(
        rename = "Length (cm)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub length_cm: Option<CellValue>,
    #[serde(rename = "Width (cm)", default, skip_serializing_if = "Option::is_none")]
    pub width_cm: Option<CellValue>,
    #[serde(
        rename = "Height (cm)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub height_cm: Option<CellValue>,
    #[serde(
        rename = "Backorders allowed?",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub backorders: Option<CellValue>,
    #[serde(
        rename = "Is featured?",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_featured: Option<CellValue>,
    #[serde(
        rename = "Sold individually?",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sold_individually: Option<CellValue>,
    #[serde(
        rename = "Allow customer reviews?",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_reviews: Option<CellValue>,
    #[serde(rename = "Stock", default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<CellValue>,
    #[serde(rename = "Categories", default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<CellValue>,
    #[serde(rename = "Tags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<CellValue>,
    #[serde(rename = "Images", default, skip_serializing_if = "Option::is_none")]
    pub images: Option<CellValue>,
    #[serde(
        rename = "Attribute 1 name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute1_name: Option<CellValue>,
    #[serde(
        rename = "Attribute 1 value(s)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute1_values: Option<CellValue>,
    #[serde(
        rename = "Attribute 2 name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute2_name: Option<CellValue>,
    #[serde(
        rename = "Attribute 2 value(s)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute2_values: Option<CellValue>,
    #[serde(
        rename = "Attribute 3 name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute3_name: Option<CellValue>,
    #[serde(
        rename = "Attribute 3 value(s)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute3_values: Option<CellValue>,
    #[serde(rename = "Parent", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CellValue>,
    #[serde(
        rename = "Short description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub short_description: Option<CellValue>,
    #[serde(
        rename = "Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<CellValue>,
    #[serde(rename = "SEO Title", default, skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<CellValue>,
    #[serde(
        rename = "Meta Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meta_description: Option<CellValue>,
    /// Nested variations are accepted on submission and flattened into
    /// standalone rows before validation; they are never persisted nested.
    #[serde(rename = "Variations", default, skip_serializing_if = "Option::is_none")]
    pub variations: Option<Vec<WooProduct>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl WooProduct {
    pub fn type_lower(&self) -> String {
        cell_text(&self.product_type)
            .unwrap_or_default()
            .to_lowercase()
    }

    pub fn is_variation(&self) -> bool {
        self.type_lower() == "variation"
    }

    pub fn is_variable_parent(&self) -> bool {
        self.type_lower() == "variable"
    }

    pub fn sku_text(&self) -> Option<String> {
        cell_text(&self.sku)
    }
}

/// One Shopify CSV row; multi-variant products arrive as several rows
/// sharing a Handle.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShopifyProduct {
    #[serde(rename = "Handle", default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<CellValue>,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<CellValue>,
    #[serde(
        rename = "Body (HTML)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub body_html: Option<CellValue>,
    #[serde(rename = "Vendor", default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<CellValue>,
    #[serde(
        rename = "Product Category",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub product_category: Option<CellValue>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<CellValue>,
    #[serde(rename = "Tags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<CellValue>,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CellValue>,
    #[serde(rename = "Gift Card", default, skip_serializing_if = "Option::is_none")]
    pub gift_card: Option<CellValue>,
    #[serde(rename = "SEO Title", default, skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<CellValue>,
    #[serde(
        rename = "SEO Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub seo_description: Option<CellValue>,
    #[serde(
        rename = "Option1 Name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option1_name: Option<CellValue>,
    #[serde(
        rename = "Option1 Value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option1_value: Option<CellValue>,
    #[serde(
        rename = "Option1 Linked To",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option1_linked_to: Option<CellValue>,
    #[serde(
        rename = "Option2 Name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option2_name: Option<CellValue>,
    #[serde(
        rename = "Option2 Value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option2_value: Option<CellValue>,
    #[serde(
        rename = "Option2 Linked To",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option2_linked_to: Option<CellValue>,
    #[serde(
        rename = "Option3 Name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option3_name: Option<CellValue>,
    #[serde(
        rename = "Option3 Value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option3_value: Option<CellValue>,
    #[serde(
        rename = "Option3 Linked To",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub option3_linked_to: Option<CellValue>,
    #[serde(
        rename = "Variant SKU",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub variant_sku: Option<CellValue>,
    #[serde(
        rename = "Variant Price",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub variant_price: Option<CellValue>,
    #[serde(
        rename = "Variant Compare At Price",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub variant_compare_at_price: Option<CellValue>,
    #[serde(
        rename = "Variant Barcode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub variant_barcode: Option<CellValue>,
    #[serde(
        rename = "Cost per item",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cost_per_item: Option<CellValue>,
    #[serde(
        rename = "Unit Price Total Measure",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_price_total_measure: Option<CellValue>,
    #[serde(
        rename = "Unit Price Total Measure Unit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_price_total_measure_unit: Option<CellValue>,
    #[serde(
        rename = "Unit Price Base Measure",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_price_base_measure: Option<CellValue>,
    #[serde(
        rename = "Unit Price Base Measure Unit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_price_base_measure_unit: Option<CellValue>,
    #[serde(rename = "Image Src", default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<CellValue>,
    #[serde(
        rename = "Image Alt Text",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_alt_text: Option<CellValue>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ShopifyProduct {
    pub fn handle_text(&self) -> Option<String> {
        cell_text(&self.handle)
    }
}

/// Platform-tagged product list carried through the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "platform", content = "products", rename_all = "lowercase")]
pub enum ProductSet {
    WooCommerce(Vec<WooProduct>),
    Shopify(Vec<ShopifyProduct>),
}

impl ProductSet {
    pub fn platform(&self) -> Platform {
        match self {
            ProductSet::WooCommerce(_) => Platform::WooCommerce,
            ProductSet::Shopify(_) => Platform::Shopify,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ProductSet::WooCommerce(rows) => rows.len(),
            ProductSet::Shopify(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn empty_like(&self) -> ProductSet {
        match self {
            ProductSet::WooCommerce(_) => ProductSet::WooCommerce(Vec::new()),
            ProductSet::Shopify(_) => ProductSet::Shopify(Vec::new()),
        }
    }

    pub fn chunks(&self, size: usize) -> Vec<ProductSet> {
        let size = size.max(1);
        match self {
            ProductSet::WooCommerce(rows) => rows
                .chunks(size)
                .map(|chunk| ProductSet::WooCommerce(chunk.to_vec()))
                .collect(),
            ProductSet::Shopify(rows) => rows
                .chunks(size)
                .map(|chunk| ProductSet::Shopify(chunk.to_vec()))
                .collect(),
        }
    }

    pub fn extend(&mut self, other: ProductSet) {
        match (self, other) {
            (ProductSet::WooCommerce(dst), ProductSet::WooCommerce(src)) => dst.extend(src),
            (ProductSet::Shopify(dst), ProductSet::Shopify(src)) => dst.extend(src),
            _ => tracing::warn!(
                target = "catforge.models",
                "ignored extend across platforms"
            ),
        }
    }

    pub fn into_records(self) -> Vec<ProductRecord> {
        match self {
            ProductSet::WooCommerce(rows) => {
                rows.into_iter().map(ProductRecord::WooCommerce).collect()
            }
            ProductSet::Shopify(rows) => rows.into_iter().map(ProductRecord::Shopify).collect(),
        }
    }
}

/// A single persisted product row, platform-tagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "platform", content = "record", rename_all = "lowercase")]
pub enum ProductRecord {
    WooCommerce(WooProduct),
    Shopify(ShopifyProduct),
}

/// AI-authored fields returned by the generation service, keyed by the
/// platform identity field (SKU or Handle).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GeneratedContent {
    #[serde(rename = "SKU", default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(rename = "Handle", default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(
        rename = "Short description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub short_description: Option<String>,
    #[serde(
        rename = "Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "Body (HTML)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub body_html: Option<String>,
    #[serde(rename = "SEO Title", default, skip_serializing_if = "Option::is_none")]
    pub seo_title: Option<String>,
    #[serde(
        rename = "Meta Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meta_description: Option<String>,
    #[serde(
        rename = "SEO Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub seo_description: Option<String>,
    #[serde(
        rename = "Image Alt Text",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_alt_text: Option<String>,
}

/// Flatten submissions that nest variation rows under their parent. Each
/// extracted variation keeps (or inherits) a `Parent` reference to the
/// parent SKU so downstream grouping still works.
pub fn flatten_variations(products: Vec<WooProduct>) -> Vec<WooProduct> {
    let mut flat = Vec::with_capacity(products.len());
    for mut product in products {
        let variations = product.variations.take();
        let parent_key = product
            .sku_text()
            .or_else(|| cell_text(&product.name))
            .map(CellValue::from_text);
        flat.push(product);
        if let Some(variations) = variations {
            for mut variation in variations {
                if cell_is_blank(&variation.parent) {
                    variation.parent = parent_key.clone();
                }
                variation.variations = None;
                flat.push(variation);
            }
        }
    }
    flat
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
