//! Wire types for the backend's JSON API.
//!
//! Shapes mirror the backend's serializers field-for-field. Read-side
//! structs are liberal (`#[serde(default)]` on fields the backend may omit
//! or null); write-side structs contain exactly what the server expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{
    CategoryId, CustomerId, PaymentMethod, Price, ProductId, SaleId, SaleStatus, UserId,
};

/// The authenticated user, as returned by `GET /api/profile/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: CategoryId,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    pub stock: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A customer on file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// One line of a submitted sale, as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: i64,
    pub product: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    pub price: Price,
    pub total: Price,
}

/// A recorded sale, as returned by `GET /api/sales/…`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    #[serde(default)]
    pub reference_no: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerId>,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub status: SaleStatus,
    pub total_amount: Price,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<SaleItem>,
}

/// One page of the sales list (`GET /api/sales/?page=N`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePage {
    pub count: u64,
    pub results: Vec<Sale>,
}

/// One line of a sale submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItemInput {
    pub product: ProductId,
    pub quantity: u32,
    pub price: Price,
}

/// The payload for `POST /api/sales/create/`.
///
/// A pure projection of the cart - computed on demand, never mutated in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleSubmission {
    pub items: Vec<SaleItemInput>,
    pub customer: Option<CustomerId>,
    pub total_amount: Price,
    pub payment_method: PaymentMethod,
    pub notes: String,
}

/// Fields for `POST /api/register/`.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_product_decodes_backend_shape() {
        let json = r#"{
            "id": 3,
            "name": "Espresso",
            "category": 1,
            "category_name": "Drinks",
            "description": "",
            "price": "2.50",
            "stock": 40,
            "image": null,
            "barcode": "4006381333931",
            "created_at": "2026-01-05T09:30:00Z",
            "updated_at": "2026-01-05T09:30:00Z"
        }"#;
        let product: Product = serde_json::from_str(json).expect("decode");
        assert_eq!(product.id, ProductId::new(3));
        assert_eq!(product.price, Price::from_str("2.50").expect("price"));
        assert!(product.image.is_none());
    }

    #[test]
    fn test_sale_submission_wire_shape() {
        let submission = SaleSubmission {
            items: vec![SaleItemInput {
                product: ProductId::new(1),
                quantity: 2,
                price: Price::from_major(10),
            }],
            customer: Some(CustomerId::new(5)),
            total_amount: Price::from_major(20),
            payment_method: PaymentMethod::Card,
            notes: String::new(),
        };
        let value = serde_json::to_value(&submission).expect("encode");
        assert_eq!(value["items"][0]["product"], 1);
        assert_eq!(value["items"][0]["price"], "10");
        assert_eq!(value["customer"], 5);
        assert_eq!(value["payment_method"], "CARD");
    }
}
