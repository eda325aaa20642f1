use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use dashcache::cache::{EntityId, Page};
use dashcache::config::Config;
use dashcache::dashboard::{snapshot_layer, Dashboard};
use dashcache::facade::DomainFacade;
use dashcache::service::{RemoteService, RestClient};
use dashcache::ServiceError;
use dashcache::view::{Formatter, Present};

#[derive(Parser, Debug)]
#[command(name = "dashcache")]
#[command(about = "Browse and edit the admin dashboard's catalog from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dashcache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Zero-based page to list
  #[arg(short, long, global = true, default_value_t = 0)]
  page: u32,

  /// Page size (default: pagination.default_size from the config)
  #[arg(short, long, global = true)]
  size: Option<u32>,

  /// Only show rows containing this text
  #[arg(long, global = true)]
  search: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  Brands {
    #[command(subcommand)]
    action: BrandAction,
  },
  Coupons {
    #[command(subcommand)]
    action: EntityAction,
  },
  Variants {
    #[command(subcommand)]
    action: VariantAction,
  },
  OrderItems {
    #[command(subcommand)]
    action: OrderItemAction,
  },
  Addresses {
    /// Owner of the addresses
    #[arg(short, long)]
    user: EntityId,

    #[command(subcommand)]
    action: AddressAction,
  },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum EntityAction {
  /// List one page
  List,
  /// Show a single entity
  Show { id: EntityId },
  /// Flip the active flag
  Toggle { id: EntityId },
  Delete { id: EntityId },
}

#[derive(Subcommand, Debug)]
enum BrandAction {
  #[command(flatten)]
  Entity(EntityAction),
  /// Active/inactive counts for the page
  Summary,
}

#[derive(Subcommand, Debug)]
enum VariantAction {
  #[command(flatten)]
  Entity(EntityAction),
  /// Set a variant's stock quantity
  Stock {
    id: EntityId,
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
  },
  /// Variants at or below the low stock threshold
  LowStock,
  OutOfStock,
}

#[derive(Subcommand, Debug)]
enum OrderItemAction {
  #[command(flatten)]
  Entity(EntityAction),
  Bestsellers,
  /// Sales totals for one product
  Sales { product_id: EntityId },
}

#[derive(Subcommand, Debug)]
enum AddressAction {
  #[command(flatten)]
  Entity(EntityAction),
  /// Make an address the user's default
  Default { id: EntityId },
}

/// Page and search options shared by every `list`.
struct ListOptions {
  page: u32,
  search: Option<String>,
}

type ViewOf<D> = <<<D as DomainFacade>::Service as RemoteService>::Entity as Present>::View;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = setup_tracing();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(size) = args.size {
    config.pagination.default_size = size.max(1);
  }

  let client = RestClient::new(&config.api, Config::get_api_token())?;
  info!(base_url = %client.base_url(), "starting");
  let mut dash = Dashboard::new(&config, client, snapshot_layer(&config));
  let fmt = dash.formatter();
  let opts = ListOptions {
    page: args.page,
    search: args.search,
  };

  match args.command {
    Command::Brands { action } => match action {
      BrandAction::Entity(action) => run(&mut dash.brands, action, &opts, &fmt).await,
      BrandAction::Summary => {
        dash.brands.refresh();
        settle(&mut dash.brands).await?;
        let summary = dash.brands.summary();
        println!(
          "{} brands: {} active, {} inactive",
          summary.total, summary.active, summary.inactive
        );
        Ok(())
      }
    },
    Command::Coupons { action } => run(&mut dash.coupons, action, &opts, &fmt).await,
    Command::Variants { action } => match action {
      VariantAction::Entity(action) => run(&mut dash.variants, action, &opts, &fmt).await,
      VariantAction::Stock { id, quantity } => {
        dash.variants.update_stock(id, quantity)?;
        settle(&mut dash.variants).await?;
        println!("stock of #{id} set to {quantity}");
        Ok(())
      }
      VariantAction::LowStock => {
        dash.variants.refresh_low_stock();
        settle(&mut dash.variants).await?;
        print_rows(dash.variants.low_stock().iter().map(|v| v.present(&fmt)));
        Ok(())
      }
      VariantAction::OutOfStock => {
        dash.variants.refresh_out_of_stock();
        settle(&mut dash.variants).await?;
        print_rows(dash.variants.out_of_stock().iter().map(|v| v.present(&fmt)));
        Ok(())
      }
    },
    Command::OrderItems { action } => match action {
      OrderItemAction::Entity(action) => run(&mut dash.order_items, action, &opts, &fmt).await,
      OrderItemAction::Bestsellers => {
        dash.order_items.load_bestsellers();
        dash.order_items.settle().await;
        let query = dash.order_items.bestsellers();
        stale_warning(query.error(), query.data().is_some())?;
        for (rank, seller) in query.data().into_iter().flatten().enumerate() {
          println!(
            "{:>3}. #{:<6} {:<32} {:>6} sold  {:>12}",
            rank + 1,
            seller.product_id,
            seller.product_name,
            seller.total_quantity,
            fmt.money(seller.total_revenue)
          );
        }
        Ok(())
      }
      OrderItemAction::Sales { product_id } => {
        dash.order_items.load_product_sales(product_id);
        dash.order_items.settle().await;
        let query = dash
          .order_items
          .product_sales(product_id)
          .ok_or_else(|| eyre!("no sales query for product #{product_id}"))?;
        stale_warning(query.error(), query.data().is_some())?;
        if let Some(sales) = query.data() {
          println!(
            "product #{}: {} sold in {} orders, {} revenue",
            sales.product_id,
            sales.total_quantity,
            sales.order_count,
            fmt.money(sales.total_revenue)
          );
        }
        Ok(())
      }
    },
    Command::Addresses { user, action } => {
      let mut addresses = dash.addresses(user);
      match action {
        AddressAction::Entity(action) => run(&mut addresses, action, &opts, &fmt).await,
        AddressAction::Default { id } => {
          addresses.set_default(id);
          settle(&mut addresses).await?;
          match addresses.current().or_else(|| addresses.default_address()) {
            Some(address) => println!("{}", address.present(&fmt)),
            None => println!("#{id} is now the default address"),
          }
          Ok(())
        }
      }
    }
  }
}

/// Log to a daily file under the data directory; stdout is for output.
fn setup_tracing() -> Option<WorkerGuard> {
  let dir = dirs::data_dir()?.join("dashcache").join("logs");
  std::fs::create_dir_all(&dir).ok()?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "dashcache.log"));
  let filter = EnvFilter::try_from_env("DASHCACHE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Some(guard)
}

async fn run<D>(domain: &mut D, action: EntityAction, opts: &ListOptions, fmt: &Formatter) -> Result<()>
where
  D: DomainFacade,
  ViewOf<D>: Display,
{
  match action {
    EntityAction::List => list(domain, opts, fmt).await,
    EntityAction::Show { id } => {
      domain.entities_mut().open(id);
      settle(domain).await?;
      let entity = domain
        .entities()
        .current()
        .ok_or_else(|| eyre!("#{id} not found"))?;
      println!("{}", entity.present(fmt));
      println!("{}", serde_json::to_string_pretty(entity)?);
      Ok(())
    }
    EntityAction::Toggle { id } => {
      domain.entities_mut().toggle_status(id);
      settle(domain).await?;
      match domain.entities().cache().find(id) {
        Some(entity) => println!("{}", entity.present(fmt)),
        None => println!("toggled #{id}"),
      }
      Ok(())
    }
    EntityAction::Delete { id } => {
      domain.entities_mut().delete(id);
      settle(domain).await?;
      println!("deleted #{id}");
      Ok(())
    }
  }
}

/// Show the last snapshot while the page loads, then the fetched page. A
/// failed fetch over a restored snapshot is reported but not fatal.
async fn list<D>(domain: &mut D, opts: &ListOptions, fmt: &Formatter) -> Result<()>
where
  D: DomainFacade,
  ViewOf<D>: Display,
{
  let entities = domain.entities_mut();
  if opts.page == 0 {
    entities.restore();
    entities.refresh();
  } else {
    entities.set_page(opts.page);
  }
  if let Some(query) = &opts.search {
    entities.search(query);
  }

  let failure = domain
    .settle_all()
    .await
    .into_iter()
    .find_map(|settled| settled.into_result().err());

  let entities = domain.entities();
  if let Some(e) = failure {
    if !entities.source().is_offline() {
      return Err(e.into());
    }
    eprintln!("warning: {e}; showing cached data");
  }

  print_rows(entities.formatted(fmt).iter());
  print_footer(entities.page());
  Ok(())
}

/// A failed aggregate fetch is fatal only when there is nothing older to show.
fn stale_warning(error: Option<&ServiceError>, has_data: bool) -> Result<()> {
  match error {
    Some(e) if !has_data => Err(eyre!("{e}")),
    Some(e) => {
      eprintln!("warning: {e}; showing earlier results");
      Ok(())
    }
    None => Ok(()),
  }
}

async fn settle<D: DomainFacade>(domain: &mut D) -> Result<()> {
  for settled in domain.settle_all().await {
    settled.into_result()?;
  }
  Ok(())
}

fn print_rows<I>(rows: I)
where
  I: IntoIterator,
  I::Item: Display,
{
  let mut count = 0;
  for row in rows {
    println!("{row}");
    count += 1;
  }
  if count == 0 {
    println!("(nothing to show)");
  }
}

fn print_footer<T>(page: &Page<T>) {
  println!(
    "page {} of {} ({} total)",
    page.number() + 1,
    page.total_pages().max(1),
    page.total_elements()
  );
}
