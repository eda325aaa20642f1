//! The five admin domains and their facade specializations.

pub mod address;
pub mod brand;
pub mod coupon;
pub mod order_item;
pub mod variant;

use serde::{Deserialize, Deserializer};

use crate::cache::{Entity, Mutation};
use crate::view::ImageVersions;

pub use address::{Address, AddressFacade, AddressFilters, AddressPayload, AddressResource, AddressService, AddressView};
pub use brand::{Brand, BrandFacade, BrandFilters, BrandPayload, BrandResource, BrandSummary, BrandView};
pub use coupon::{Coupon, CouponFacade, CouponFilters, CouponPayload, CouponResource, CouponStatus, CouponType, CouponView};
pub use order_item::{
  BestSeller, OrderItem, OrderItemFacade, OrderItemFilters, OrderItemPayload, OrderItemResource, OrderItemService, OrderItemView,
  ProductSales,
};
pub use variant::{
  ProductVariant, StockLevel, StockSideCaches, VariantFacade, VariantFilters, VariantPayload, VariantResource, VariantService,
  VariantView,
};

/// Advance image version tokens for a result about to be folded in: a list
/// reload refreshes every image, an edit refreshes that entity's.
pub(crate) fn bump_images<T: Entity>(images: &mut ImageVersions, mutation: &Mutation<T>) {
  match mutation {
    Mutation::Fetched(_) => {
      images.bump_all();
    }
    Mutation::Updated(entity) | Mutation::Patched(entity) => {
      images.bump(entity.id());
    }
    _ => {}
  }
}

/// `null` and blank strings both become `None`.
pub(crate) fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v: Option<String> = Option::deserialize(deserializer)?;
  Ok(v.filter(|s| !s.trim().is_empty()))
}

pub(crate) fn is_blank(value: &str) -> bool {
  value.trim().is_empty()
}
