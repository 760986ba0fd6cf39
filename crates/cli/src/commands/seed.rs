//! Seed the catalog from a YAML file.
//!
//! Categories are upserted by slug and products by name, so the same file
//! can be applied repeatedly.
//!
//! ```yaml
//! categories:
//!   - name: Electrónica
//!     slug: electronica
//! products:
//!   - name: Auriculares Bluetooth
//!     category: electronica
//!     price: 25999.99
//!     stock: 40
//!     free_shipping: true
//! ```

use std::collections::HashMap;
use std::path::Path;

use mercadoboom_core::CategoryId;
use mercadoboom_storefront::db::{CategoryRepository, ProductRepository, RepositoryError};
use mercadoboom_storefront::models::catalog::{CategoryInput, ProductInput};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use super::MissingDatabaseUrl;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Catalog file layout.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategoryInput>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

/// A product entry, referencing its category by slug.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub category: Option<String>,
    #[serde(flatten)]
    pub product: ProductInput,
}

/// Check every entry, collecting all problems.
fn validate(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut slugs = Vec::with_capacity(catalog.categories.len());

    for category in &catalog.categories {
        match category.normalized_slug() {
            Ok(slug) => slugs.push(slug),
            Err(e) => errors.push(format!("category {:?}: {e}", category.name)),
        }
    }

    for entry in &catalog.products {
        if let Err(e) = entry.product.validate() {
            errors.push(format!("product {:?}: {e}", entry.product.name));
        }
        if let Some(slug) = &entry.category
            && !slugs.contains(slug)
        {
            errors.push(format!(
                "product {:?}: unknown category {slug:?}",
                entry.product.name
            ));
        }
    }

    errors
}

/// Seed categories and products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or a database write fails.
pub async fn catalog(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    info!(
        categories = catalog.categories.len(),
        products = catalog.products.len(),
        "Catalog validated successfully"
    );

    let url = super::database_url()?;
    let pool = mercadoboom_storefront::db::create_pool(&url).await?;
    info!("Connected to database");

    let categories = CategoryRepository::new(&pool);
    let mut category_ids: HashMap<String, CategoryId> = HashMap::new();
    for input in &catalog.categories {
        let slug = input
            .normalized_slug()
            .map_err(|_| SeedError::Invalid(1))?;
        let category = categories.upsert(input, &slug).await?;
        category_ids.insert(category.slug, category.id);
    }

    let products = ProductRepository::new(&pool);
    let (mut created, mut updated) = (0_usize, 0_usize);
    for entry in catalog.products {
        let mut input = entry.product;
        input.category_id = entry
            .category
            .as_ref()
            .and_then(|slug| category_ids.get(slug).copied());

        match products.get_by_name(input.name.trim()).await? {
            Some(existing) => {
                products.update(existing.id, &input).await?;
                updated += 1;
            }
            None => {
                products.create(&input).await?;
                created += 1;
            }
        }
    }

    info!(
        categories = category_ids.len(),
        created, updated, "Catalog seeding complete"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r"
categories:
  - name: Electrónica
    slug: electronica
  - name: Hogar y Jardín
products:
  - name: Auriculares Bluetooth
    category: electronica
    price: 25999.99
    stock: 40
    free_shipping: true
  - name: Silla plegable
    category: hogar-y-jardin
    price: 18000
";

    #[test]
    fn test_parse_catalog() {
        let catalog: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        assert_eq!(catalog.categories.len(), 2);
        assert_eq!(catalog.products.len(), 2);

        let headphones = &catalog.products[0];
        assert_eq!(headphones.category.as_deref(), Some("electronica"));
        assert_eq!(headphones.product.stock, 40);
        assert!(headphones.product.free_shipping);
        assert!(headphones.product.is_active);
    }

    #[test]
    fn test_validate_accepts_derived_slugs() {
        let catalog: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        assert!(validate(&catalog).is_empty());
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let catalog: CatalogFile = serde_yaml::from_str(
            r"
products:
  - name: Sin precio
    price: 0
  - name: Huérfano
    category: no-existe
    price: 100
",
        )
        .unwrap();
        let errors = validate(&catalog);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("price"));
        assert!(errors[1].contains("no-existe"));
    }
}
