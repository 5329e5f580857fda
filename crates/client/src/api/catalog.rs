//! Typed wrappers for the backend's CRUD routes.
//!
//! These are thin projections over [`super::ApiClient::send_json`]; nothing
//! here is special-cased beyond the payload shapes. All of them inherit the
//! refresh-and-retry behavior of the underlying client.

use tillpoint_core::{CategoryId, ProductId, SaleId};

use crate::types::{Category, Customer, Product, Sale, SalePage, SaleSubmission};

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    // =========================================================================
    // Products
    // =========================================================================

    /// List every product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or authorization failure.
    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        self.send_json(&ApiRequest::get("api/products/")).await
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the id is unknown.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.send_json(&ApiRequest::get(format!("api/products/{id}/")))
            .await
    }

    /// Search products by name or barcode.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or authorization failure.
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError> {
        self.send_json(&ApiRequest::get("api/products/search/").query("q", query))
            .await
    }

    /// List the products in one category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or authorization failure.
    pub async fn products_by_category(
        &self,
        category: CategoryId,
    ) -> Result<Vec<Product>, ApiError> {
        self.send_json(&ApiRequest::get(format!("api/products/category/{category}/")))
            .await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// List every category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or authorization failure.
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.send_json(&ApiRequest::get("api/categories/")).await
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// List every customer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or authorization failure.
    pub async fn list_customers(&self) -> Result<Vec<Customer>, ApiError> {
        self.send_json(&ApiRequest::get("api/customers/")).await
    }

    /// Search customers by name.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or authorization failure.
    pub async fn search_customers(&self, query: &str) -> Result<Vec<Customer>, ApiError> {
        self.send_json(&ApiRequest::get("api/customers/search/").query("q", query))
            .await
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Submit a completed cart as a sale.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` if the submission cannot be serialized,
    /// otherwise as [`ApiClient::send_json`].
    pub async fn submit_sale(&self, submission: &SaleSubmission) -> Result<Sale, ApiError> {
        let body = serde_json::to_value(submission)?;
        self.send_json(&ApiRequest::post("api/sales/create/").json(body))
            .await
    }

    /// Fetch one page of recorded sales.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or authorization failure.
    pub async fn list_sales(&self, page: u32) -> Result<SalePage, ApiError> {
        self.send_json(&ApiRequest::get("api/sales/").query("page", page.to_string()))
            .await
    }

    /// Fetch one recorded sale.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the id is unknown.
    pub async fn get_sale(&self, id: SaleId) -> Result<Sale, ApiError> {
        self.send_json(&ApiRequest::get(format!("api/sales/{id}/")))
            .await
    }
}
