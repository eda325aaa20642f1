//! Composition root: one facade per domain, built from the configuration.

use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{EntityId, SnapshotLayer, SqliteStorage};
use crate::config::Config;
use crate::domain::{
  AddressFacade, AddressResource, BrandFacade, BrandResource, CouponFacade, CouponResource, OrderItemFacade,
  OrderItemResource, VariantFacade, VariantResource,
};
use crate::facade::EntityFacade;
use crate::service::{RemoteService, RestClient, RestResource};
use crate::view::Formatter;

/// How many best sellers the order item aggregate asks for.
pub const BESTSELLER_LIMIT: u32 = 10;

/// Every domain facade of the admin dashboard.
///
/// Each facade owns its own cache; nothing is shared between domains except
/// the HTTP client and the snapshot store.
pub struct Dashboard {
  pub brands: BrandFacade<BrandResource>,
  pub coupons: CouponFacade<CouponResource>,
  pub variants: VariantFacade<VariantResource>,
  pub order_items: OrderItemFacade<OrderItemResource>,
  client: RestClient,
  snapshots: SnapshotLayer,
  formatter: Formatter,
  page_size: u32,
  memo_capacity: NonZeroUsize,
}

impl Dashboard {
  pub fn new(config: &Config, client: RestClient, snapshots: SnapshotLayer) -> Self {
    let page_size = config.pagination.default_size;
    let memo_capacity = config.cache.memo_capacity();

    let brands = BrandFacade::new(facade(
      RestResource::new(client.clone(), "brands"),
      page_size,
      memo_capacity,
      &snapshots,
    ));
    let coupons = facade(RestResource::new(client.clone(), "coupons"), page_size, memo_capacity, &snapshots);
    let variants = VariantFacade::new(
      facade(RestResource::new(client.clone(), "variants"), page_size, memo_capacity, &snapshots),
      config.inventory.low_stock_threshold,
    );
    let order_items = OrderItemFacade::new(
      facade(RestResource::new(client.clone(), "order-items"), page_size, memo_capacity, &snapshots),
      BESTSELLER_LIMIT,
    );

    Self {
      brands,
      coupons,
      variants,
      order_items,
      client,
      snapshots,
      formatter: Formatter::new(config.display.currency),
      page_size,
      memo_capacity,
    }
  }

  /// Addresses are scoped to one user, so their facade is built on demand.
  pub fn addresses(&self, user_id: EntityId) -> AddressFacade<AddressResource> {
    let service = RestResource::new(self.client.clone(), "addresses");
    AddressFacade::scoped(facade(service, self.page_size, self.memo_capacity, &self.snapshots), user_id)
  }

  /// Formatter measuring relative dates from now.
  pub fn formatter(&self) -> Formatter {
    self.formatter.clone().at(chrono::Utc::now())
  }

  pub fn page_size(&self) -> u32 {
    self.page_size
  }
}

fn facade<S: RemoteService>(
  service: S,
  page_size: u32,
  memo_capacity: NonZeroUsize,
  snapshots: &SnapshotLayer,
) -> EntityFacade<S> {
  EntityFacade::new(Arc::new(service), page_size)
    .with_memo_capacity(memo_capacity)
    .with_snapshots(snapshots.clone())
}

/// Snapshot layer for the configuration: sqlite in the data directory, or
/// disabled when persistence is off or the store cannot be opened.
pub fn snapshot_layer(config: &Config) -> SnapshotLayer {
  if !config.cache.persist {
    return SnapshotLayer::disabled();
  }
  match SqliteStorage::open() {
    Ok(storage) => {
      info!("page snapshots enabled");
      SnapshotLayer::new(storage)
    }
    Err(e) => {
      warn!(error = %e, "snapshot store unavailable, starting cold");
      SnapshotLayer::disabled()
    }
  }
}
