use crate::models::{
    CellValue, ProductSet, ShopifyProduct, WooProduct, cell_is_blank, cell_number, cell_text,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const WOO_TYPES: &[&str] = &[
    "simple",
    "variable",
    "variation",
    "grouped",
    "external",
    "downloadable",
];
const TAX_CLASSES: &[&str] = &["standard", "reduced-rate", "zero-rate"];
const SHOPIFY_STATUSES: &[&str] = &["active", "draft", "archived"];
const UNIT_MEASURES: &[&str] = &[
    "ml", "l", "g", "kg", "oz", "lb", "fl oz", "m", "cm", "mm", "in", "ft", "yd",
];

static BARCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8,14}$").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static METAFIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z_]+\.[a-z_]+\.[a-z_]+$").unwrap());

/// Spreadsheet rows are 1-based and row 1 is the header, so data row `i`
/// (0-based) is displayed as `i + 2`.
const HEADER_OFFSET: usize = 2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationIssue {
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn empty_input() -> Self {
        Self::from_issues(
            vec![ValidationIssue::new(
                0,
                "products",
                "Products array is required and cannot be empty",
            )],
            Vec::new(),
        )
    }
}

/// Validate a raw product list against its platform rules. Pure; errors
/// block submission, warnings never do.
pub fn validate(products: &ProductSet) -> ValidationReport {
    if products.is_empty() {
        return ValidationReport::empty_input();
    }
    match products {
        ProductSet::WooCommerce(rows) => validate_woocommerce(rows),
        ProductSet::Shopify(rows) => validate_shopify(rows),
    }
}

/// A filled cell interpreted as a number: `None` when blank, `Err` when
/// filled with something non-numeric.
fn filled_number(cell: &Option<CellValue>) -> Option<Result<f64, ()>> {
    if cell_is_blank(cell) {
        return None;
    }
    Some(cell_number(cell).ok_or(()))
}

fn validate_woocommerce(rows: &[WooProduct]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (index, product) in rows.iter().enumerate() {
        let row = index + HEADER_OFFSET;
        let is_variable_parent = product.is_variable_parent();

        for (field, value) in [
            ("Type", &product.product_type),
            ("SKU", &product.sku),
            ("Name", &product.name),
        ] {
            if cell_is_blank(value) {
                errors.push(ValidationIssue::new(row, field, format!("{field} is required")));
            }
        }

        // Variable parents carry price on their variation rows.
        if !is_variable_parent {
            match filled_number(&product.regular_price) {
                None => errors.push(ValidationIssue::new(
                    row,
                    "Regular price",
                    "Regular price is required",
                )),
                Some(Err(())) => errors.push(ValidationIssue::new(
                    row,
                    "Regular price",
                    "Price must be a positive number",
                )),
                Some(Ok(price)) if price < 0.0 => errors.push(ValidationIssue::new(
                    row,
                    "Regular price",
                    "Price must be a positive number",
                )),
                Some(Ok(price)) if price > 10_000.0 => warnings.push(ValidationIssue::new(
                    row,
                    "Regular price",
                    format!("Price seems unusually high (${price})"),
                )),
                Some(Ok(_)) => {}
            }
        }

        if let Some(kind) = cell_text(&product.product_type)
            && !WOO_TYPES.contains(&kind.to_lowercase().as_str())
        {
            errors.push(ValidationIssue::new(
                row,
                "Type",
                format!("Type must be one of: {}", WOO_TYPES.join(", ")),
            ));
        }

        if let Some(gtin) = cell_text(&product.gtin)
            && !BARCODE_RE.is_match(&gtin)
        {
            errors.push(ValidationIssue::new(
                row,
                "GTIN, UPC, EAN, or ISBN",
                "GTIN/UPC/EAN must be 8-14 digits only",
            ));
        }

        check_weight(
            row,
            &product.weight_kg,
            "Weight (kg)",
            "kilograms",
            50.0,
            "kg",
            &mut errors,
            &mut warnings,
        );
        check_weight(
            row,
            &product.weight_g,
            "Weight (g)",
            "grams",
            50_000.0,
            "g",
            &mut errors,
            &mut warnings,
        );

        for (field, value) in [
            ("Length (cm)", &product.length_cm),
            ("Width (cm)", &product.width_cm),
            ("Height (cm)", &product.height_cm),
        ] {
            match filled_number(value) {
                Some(Err(())) => errors.push(ValidationIssue::new(
                    row,
                    field,
                    format!("{field} must be a positive number"),
                )),
                Some(Ok(dim)) if dim < 0.0 => errors.push(ValidationIssue::new(
                    row,
                    field,
                    format!("{field} must be a positive number"),
                )),
                Some(Ok(dim)) if dim > 500.0 => warnings.push(ValidationIssue::new(
                    row,
                    field,
                    format!("{field} seems unusually large ({dim}cm)"),
                )),
                _ => {}
            }
        }

        check_sale_price(row, product, &mut errors, &mut warnings);
        check_sale_dates(row, product, &mut errors);

        if let Some(tax_class) = cell_text(&product.tax_class)
            && !TAX_CLASSES.contains(&tax_class.to_lowercase().as_str())
        {
            errors.push(ValidationIssue::new(
                row,
                "Tax class",
                format!("Tax class must be one of: {}", TAX_CLASSES.join(", ")),
            ));
        }

        if let Some(parsed) = filled_number(&product.backorders) {
            let ok = matches!(parsed, Ok(v) if v == 0.0 || v == 1.0 || v == 2.0);
            if !ok {
                errors.push(ValidationIssue::new(
                    row,
                    "Backorders allowed?",
                    "Backorders must be 0 (No), 1 (Notify), or 2 (Yes)",
                ));
            }
        }

        for (field, value) in [
            ("Is featured?", &product.is_featured),
            ("Sold individually?", &product.sold_individually),
            ("Allow customer reviews?", &product.allow_reviews),
        ] {
            if let Some(parsed) = filled_number(value) {
                let ok = matches!(parsed, Ok(v) if v == 0.0 || v == 1.0);
                if !ok {
                    errors.push(ValidationIssue::new(
                        row,
                        field,
                        format!("{field} must be 0 or 1"),
                    ));
                }
            }
        }

        if let Some(parsed) = filled_number(&product.stock) {
            let ok = matches!(parsed, Ok(v) if v >= 0.0 && v.fract() == 0.0);
            if !ok {
                errors.push(ValidationIssue::new(
                    row,
                    "Stock",
                    "Stock must be a whole number >= 0",
                ));
            }
        }

        if cell_is_blank(&product.categories) && !product.is_variation() {
            warnings.push(ValidationIssue::new(
                row,
                "Categories",
                "Product has no category assigned",
            ));
        }
    }

    ValidationReport::from_issues(errors, warnings)
}

#[allow(clippy::too_many_arguments)]
fn check_weight(
    row: usize,
    cell: &Option<CellValue>,
    field: &str,
    unit_name: &str,
    high_mark: f64,
    unit: &str,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    match filled_number(cell) {
        Some(Err(())) => errors.push(ValidationIssue::new(
            row,
            field,
            format!("Weight must be a positive number (in {unit_name})"),
        )),
        Some(Ok(weight)) if weight < 0.0 => errors.push(ValidationIssue::new(
            row,
            field,
            format!("Weight must be a positive number (in {unit_name})"),
        )),
        Some(Ok(weight)) if weight > high_mark => warnings.push(ValidationIssue::new(
            row,
            field,
            format!("Weight seems unusually high ({weight}{unit})"),
        )),
        _ => {}
    }
}

fn check_sale_price(
    row: usize,
    product: &WooProduct,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    let Some(parsed) = filled_number(&product.sale_price) else {
        return;
    };
    match parsed {
        Err(()) => errors.push(ValidationIssue::new(
            row,
            "Sale price",
            "Sale price must be a positive number",
        )),
        Ok(sale) if sale < 0.0 => errors.push(ValidationIssue::new(
            row,
            "Sale price",
            "Sale price must be a positive number",
        )),
        Ok(sale) => {
            if let Some(regular) = cell_number(&product.regular_price)
                && sale >= regular
            {
                errors.push(ValidationIssue::new(
                    row,
                    "Sale price",
                    "Sale price must be less than regular price",
                ));
            }
        }
    }

    if cell_is_blank(&product.sale_price_starts) && cell_is_blank(&product.sale_price_ends) {
        warnings.push(ValidationIssue::new(
            row,
            "Sale price",
            "Sale price set but no sale dates defined",
        ));
    }
}

fn check_sale_dates(row: usize, product: &WooProduct, errors: &mut Vec<ValidationIssue>) {
    let start = cell_text(&product.sale_price_starts);
    let end = cell_text(&product.sale_price_ends);
    if start.is_none() && end.is_none() {
        return;
    }

    let parse = |raw: &str, field: &str, errors: &mut Vec<ValidationIssue>| -> Option<NaiveDate> {
        if !DATE_RE.is_match(raw) {
            errors.push(ValidationIssue::new(
                row,
                field,
                format!("{field} must be in YYYY-MM-DD format"),
            ));
            return None;
        }
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(ValidationIssue::new(
                    row,
                    field,
                    format!("{field} must be in YYYY-MM-DD format"),
                ));
                None
            }
        }
    };

    let start = start.and_then(|raw| parse(&raw, "Date sale price starts", errors));
    let end = end.and_then(|raw| parse(&raw, "Date sale price ends", errors));

    if let (Some(start), Some(end)) = (start, end)
        && end <= start
    {
        errors.push(ValidationIssue::new(
            row,
            "Date sale price ends",
            "Sale end date must be after start date",
        ));
    }
}

fn validate_shopify(rows: &[ShopifyProduct]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (index, product) in rows.iter().enumerate() {
        let row = index + HEADER_OFFSET;

        for (field, value) in [("Handle", &product.handle), ("Title", &product.title)] {
            if cell_is_blank(value) {
                errors.push(ValidationIssue::new(row, field, format!("{field} is required")));
            }
        }

        match filled_number(&product.variant_price) {
            None => errors.push(ValidationIssue::new(
                row,
                "Variant Price",
                "Price is required",
            )),
            Some(Err(())) => errors.push(ValidationIssue::new(
                row,
                "Variant Price",
                "Price must be a positive number",
            )),
            Some(Ok(price)) if price < 0.0 => errors.push(ValidationIssue::new(
                row,
                "Variant Price",
                "Price must be a positive number",
            )),
            Some(Ok(price)) if price > 10_000.0 => warnings.push(ValidationIssue::new(
                row,
                "Variant Price",
                format!("Price seems unusually high (${price})"),
            )),
            Some(Ok(_)) => {}
        }

        if let Some(status) = cell_text(&product.status)
            && !SHOPIFY_STATUSES.contains(&status.to_lowercase().as_str())
        {
            errors.push(ValidationIssue::new(
                row,
                "Status",
                format!("Status must be one of: {}", SHOPIFY_STATUSES.join(", ")),
            ));
        }

        check_unit_pricing(row, product, &mut errors);

        for (field, value) in [
            ("Option1 Linked To", &product.option1_linked_to),
            ("Option2 Linked To", &product.option2_linked_to),
            ("Option3 Linked To", &product.option3_linked_to),
        ] {
            if let Some(reference) = cell_text(value)
                && !METAFIELD_RE.is_match(&reference)
            {
                errors.push(ValidationIssue::new(
                    row,
                    field,
                    "Must be in format: namespace.type.key (e.g., product.metafields.custom.color)",
                ));
            }
        }

        match filled_number(&product.cost_per_item) {
            Some(Err(())) => errors.push(ValidationIssue::new(
                row,
                "Cost per item",
                "Cost per item must be a positive number",
            )),
            Some(Ok(cost)) if cost < 0.0 => errors.push(ValidationIssue::new(
                row,
                "Cost per item",
                "Cost per item must be a positive number",
            )),
            Some(Ok(cost)) => {
                if let Some(price) = cell_number(&product.variant_price)
                    && cost > price
                {
                    warnings.push(ValidationIssue::new(
                        row,
                        "Cost per item",
                        format!("Cost (${cost}) is higher than price (${price}) - negative margin"),
                    ));
                }
            }
            None => {}
        }

        if let Some(gift_card) = cell_text(&product.gift_card) {
            let upper = gift_card.to_uppercase();
            if upper != "TRUE" && upper != "FALSE" {
                errors.push(ValidationIssue::new(
                    row,
                    "Gift Card",
                    "Gift Card must be TRUE or FALSE",
                ));
            }
        }
    }

    ValidationReport::from_issues(errors, warnings)
}

/// The four unit-pricing columns are all-or-none; when present the
/// measures must be positive, the units drawn from a fixed vocabulary,
/// and total >= base.
fn check_unit_pricing(row: usize, product: &ShopifyProduct, errors: &mut Vec<ValidationIssue>) {
    let cells = [
        &product.unit_price_total_measure,
        &product.unit_price_total_measure_unit,
        &product.unit_price_base_measure,
        &product.unit_price_base_measure_unit,
    ];
    let filled = cells.iter().filter(|cell| !cell_is_blank(cell)).count();

    if filled == 0 {
        return;
    }
    if filled != 4 {
        errors.push(ValidationIssue::new(
            row,
            "Unit Price Total Measure",
            "All 4 unit price fields must be filled together or left empty",
        ));
        return;
    }

    let total = cell_number(&product.unit_price_total_measure);
    let base = cell_number(&product.unit_price_base_measure);

    if !matches!(total, Some(v) if v > 0.0) {
        errors.push(ValidationIssue::new(
            row,
            "Unit Price Total Measure",
            "Unit Price Total Measure must be a positive number",
        ));
    }
    if !matches!(base, Some(v) if v > 0.0) {
        errors.push(ValidationIssue::new(
            row,
            "Unit Price Base Measure",
            "Unit Price Base Measure must be a positive number",
        ));
    }

    for (field, cell) in [
        (
            "Unit Price Total Measure Unit",
            &product.unit_price_total_measure_unit,
        ),
        (
            "Unit Price Base Measure Unit",
            &product.unit_price_base_measure_unit,
        ),
    ] {
        let unit = cell_text(cell).unwrap_or_default().to_lowercase();
        if !UNIT_MEASURES.contains(&unit.as_str()) {
            errors.push(ValidationIssue::new(
                row,
                field,
                format!("{field} must be a valid unit: {}", UNIT_MEASURES.join(", ")),
            ));
        }
    }

    if let (Some(total), Some(base)) = (total, base)
        && total < base
    {
        errors.push(ValidationIssue::new(
            row,
            "Unit Price Total Measure",
            "Total measure must be greater than or equal to base measure",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn woo(rows: serde_json::Value) -> ProductSet {
        ProductSet::WooCommerce(serde_json::from_value(rows).unwrap())
    }

    fn shopify(rows: serde_json::Value) -> ProductSet {
        ProductSet::Shopify(serde_json::from_value(rows).unwrap())
    }

    fn valid_woo_row(sku: &str) -> serde_json::Value {
        json!({
            "Type": "simple",
            "SKU": sku,
            "Name": format!("Product {sku}"),
            "Regular price": 25.0,
            "Categories": "Apparel",
        })
    }

    #[test]
    fn valid_woocommerce_list_passes() {
        let report = validate(&woo(json!([valid_woo_row("a"), valid_woo_row("b")])));
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn empty_list_is_rejected() {
        let report = validate(&woo(json!([])));
        assert!(!report.valid);
        assert_eq!(report.errors[0].row, 0);
        assert_eq!(report.errors[0].field, "products");
    }

    #[test]
    fn missing_required_field_reports_field_and_row() {
        let mut row = valid_woo_row("a");
        row.as_object_mut().unwrap().remove("Name");
        let report = validate(&woo(json!([valid_woo_row("ok"), row])));
        assert!(!report.valid);
        let issue = report.errors.iter().find(|e| e.field == "Name").unwrap();
        assert_eq!(issue.row, 3);
    }

    #[test]
    fn variable_parent_is_exempt_from_price() {
        let parent = json!({
            "Type": "variable",
            "SKU": "parent",
            "Name": "Shirt",
            "Categories": "Apparel",
        });
        let report = validate(&woo(json!([parent])));
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn unknown_type_and_bad_gtin_are_errors() {
        let mut row = valid_woo_row("a");
        row["Type"] = json!("bundle");
        row["GTIN, UPC, EAN, or ISBN"] = json!("12ab34");
        let report = validate(&woo(json!([row])));
        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"Type"));
        assert!(fields.contains(&"GTIN, UPC, EAN, or ISBN"));
    }

    #[test]
    fn sale_price_must_undercut_regular_price() {
        let mut row = valid_woo_row("a");
        row["Sale price"] = json!(30.0);
        let report = validate(&woo(json!([row])));
        assert!(!report.valid);
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.message.contains("less than regular price"))
        );
        // no dates set alongside the sale price
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.message.contains("no sale dates"))
        );
    }

    #[test]
    fn sale_dates_validate_format_and_ordering() {
        let mut row = valid_woo_row("a");
        row["Date sale price starts"] = json!("2026-03-10");
        row["Date sale price ends"] = json!("2026-03-01");
        let report = validate(&woo(json!([row])));
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.message == "Sale end date must be after start date")
        );

        let mut bad = valid_woo_row("b");
        bad["Date sale price starts"] = json!("03/10/2026");
        let report = validate(&woo(json!([bad])));
        assert!(report.errors.iter().any(|e| e.message.contains("YYYY-MM-DD")));
    }

    #[test]
    fn stock_must_be_a_whole_number() {
        let mut row = valid_woo_row("a");
        row["Stock"] = json!(2.5);
        let report = validate(&woo(json!([row])));
        assert!(report.errors.iter().any(|e| e.field == "Stock"));
    }

    #[test]
    fn high_price_and_missing_category_warn_without_blocking() {
        let row = json!({
            "Type": "simple",
            "SKU": "lux",
            "Name": "Watch",
            "Regular price": 12000,
        });
        let report = validate(&woo(json!([row])));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
    }

    fn valid_shopify_row(handle: &str) -> serde_json::Value {
        json!({
            "Handle": handle,
            "Title": format!("Product {handle}"),
            "Variant Price": 18.5,
        })
    }

    #[test]
    fn shopify_requires_handle_title_and_price() {
        let report = validate(&shopify(json!([{ "Vendor": "Acme" }])));
        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"Handle"));
        assert!(fields.contains(&"Title"));
        assert!(fields.contains(&"Variant Price"));
    }

    #[test]
    fn unit_pricing_fields_are_all_or_none() {
        let mut row = valid_shopify_row("mug");
        row["Unit Price Total Measure"] = json!(500);
        let report = validate(&shopify(json!([row])));
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.message.contains("filled together"))
        );

        let mut full = valid_shopify_row("mug");
        full["Unit Price Total Measure"] = json!(250);
        full["Unit Price Total Measure Unit"] = json!("ml");
        full["Unit Price Base Measure"] = json!(500);
        full["Unit Price Base Measure Unit"] = json!("ml");
        let report = validate(&shopify(json!([full])));
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.message.contains("greater than or equal"))
        );
    }

    #[test]
    fn unit_measure_vocabulary_is_enforced() {
        let mut row = valid_shopify_row("mug");
        row["Unit Price Total Measure"] = json!(500);
        row["Unit Price Total Measure Unit"] = json!("gallon");
        row["Unit Price Base Measure"] = json!(100);
        row["Unit Price Base Measure Unit"] = json!("ml");
        let report = validate(&shopify(json!([row])));
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.field == "Unit Price Total Measure Unit")
        );
    }

    #[test]
    fn metafield_reference_must_match_pattern() {
        let mut row = valid_shopify_row("tee");
        row["Option1 Linked To"] = json!("not-a-metafield");
        let report = validate(&shopify(json!([row])));
        assert!(report.errors.iter().any(|e| e.field == "Option1 Linked To"));

        let mut ok = valid_shopify_row("tee2");
        ok["Option1 Linked To"] = json!("product.metafields.color");
        let report = validate(&shopify(json!([ok])));
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn negative_margin_is_a_warning_only() {
        let mut row = valid_shopify_row("mug");
        row["Cost per item"] = json!(25.0);
        let report = validate(&shopify(json!([row])));
        assert!(report.valid);
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.message.contains("negative margin"))
        );
    }

    #[test]
    fn gift_card_accepts_only_true_false() {
        let mut row = valid_shopify_row("card");
        row["Gift Card"] = json!("yes");
        let report = validate(&shopify(json!([row])));
        assert!(report.errors.iter().any(|e| e.field == "Gift Card"));
    }
}
