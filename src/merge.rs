use crate::models::{CellValue, GeneratedContent, ProductSet, cell_text};
use std::collections::HashMap;

/// Overlay generated copy onto the original rows. Every original column
/// survives untouched except the AI-authored ones, and only when the
/// generation actually produced a value for them. Rows without a match
/// (and WooCommerce variation rows, which never get their own copy) pass
/// through unchanged.
pub fn merge_generated(original: &ProductSet, generated: &[GeneratedContent]) -> ProductSet {
    match original {
        ProductSet::WooCommerce(rows) => {
            let by_sku: HashMap<&str, &GeneratedContent> = generated
                .iter()
                .filter_map(|content| content.sku.as_deref().map(|sku| (sku, content)))
                .collect();

            let merged = rows
                .iter()
                .map(|row| {
                    let mut row = row.clone();
                    if row.is_variation() {
                        return row;
                    }
                    let Some(content) = row.sku_text().and_then(|sku| by_sku.get(sku.as_str()))
                    else {
                        tracing::warn!(
                            target = "catforge.worker",
                            sku = row.sku_text().unwrap_or_default(),
                            "no generated content for product"
                        );
                        return row;
                    };
                    overlay(&mut row.short_description, &content.short_description);
                    overlay(&mut row.description, &content.description);
                    overlay(&mut row.seo_title, &content.seo_title);
                    overlay(&mut row.meta_description, &content.meta_description);
                    row
                })
                .collect();
            ProductSet::WooCommerce(merged)
        }
        ProductSet::Shopify(rows) => {
            let by_handle: HashMap<&str, &GeneratedContent> = generated
                .iter()
                .filter_map(|content| content.handle.as_deref().map(|handle| (handle, content)))
                .collect();

            // copy lands on every variant row sharing the Handle
            let merged = rows
                .iter()
                .map(|row| {
                    let mut row = row.clone();
                    let Some(content) = row
                        .handle_text()
                        .and_then(|handle| by_handle.get(handle.as_str()))
                    else {
                        tracing::warn!(
                            target = "catforge.worker",
                            handle = row.handle_text().unwrap_or_default(),
                            "no generated content for product"
                        );
                        return row;
                    };
                    overlay(&mut row.body_html, &content.body_html);
                    overlay(&mut row.seo_title, &content.seo_title);
                    overlay(&mut row.seo_description, &content.seo_description);
                    overlay(&mut row.image_alt_text, &content.image_alt_text);
                    row
                })
                .collect();
            ProductSet::Shopify(merged)
        }
    }
}

fn overlay(target: &mut Option<CellValue>, generated: &Option<String>) {
    if let Some(value) = generated
        && !value.trim().is_empty()
    {
        *target = Some(CellValue::from_text(value.clone()));
    }
}
