use std::{collections::HashSet, sync::Arc};

use futures::future::join_all;
use itertools::Itertools;
use premia_data::{
    exchange::{MarketClient, VenueDirectory},
    feed::FeedHandle,
    shared::subscription_models::{ExchangeId, MarketListing, Venue},
};
use tracing::{info, warn};

use crate::watch::WatchError;

/*----- */
// Shared overseas
/*----- */
// One set of overseas clients and sockets, lent to every domestic pairing.
#[derive(Debug)]
pub struct SharedOverseas {
    pub exchange: ExchangeId,
    pub spot: Option<Arc<dyn MarketClient>>,
    pub perp: Option<Arc<dyn MarketClient>>,
    pub spot_feed: Option<FeedHandle>,
    pub perp_feed: Option<FeedHandle>,
}

impl SharedOverseas {
    pub fn feeds(&self) -> impl Iterator<Item = &FeedHandle> {
        self.spot_feed.iter().chain(self.perp_feed.iter())
    }

    pub fn close(&self) {
        self.feeds().for_each(FeedHandle::close);
    }
}

async fn listings_or_empty(client: &dyn MarketClient) -> Vec<MarketListing> {
    match client.markets().await {
        Ok(listings) => listings,
        Err(error) => {
            warn!(venue = %client.venue(), error = %error, action = "skipping venue listings", "market listing failed");
            Vec::new()
        }
    }
}

async fn domestic_coins(directory: &dyn VenueDirectory, exchange: ExchangeId) -> Vec<String> {
    match directory.market_client(Venue::spot(exchange)) {
        Some(client) => listings_or_empty(client.as_ref())
            .await
            .into_iter()
            .map(|listing| listing.coin)
            .collect(),
        None => Vec::new(),
    }
}

/// Ids of `listings` whose coin is in `coins`, first id per coin.
fn ids_for(listings: &[MarketListing], coins: &HashSet<String>) -> Vec<String> {
    listings
        .iter()
        .filter(|listing| coins.contains(&listing.coin))
        .unique_by(|listing| listing.coin.clone())
        .map(|listing| listing.id.clone())
        .collect()
}

/// Clients and feeds for `exchange`, covering every perp coin that also trades on
/// one of `domestic`. A failing perp listing or perp feed fails the bundle, the
/// spot side only degrades.
pub async fn build_shared_overseas(
    directory: &dyn VenueDirectory,
    exchange: ExchangeId,
    domestic: &[ExchangeId],
) -> Result<SharedOverseas, WatchError> {
    let perp_venue = Venue::perp(exchange);
    let spot_venue = Venue::spot(exchange);
    let perp = directory
        .market_client(perp_venue)
        .ok_or(WatchError::VenueUnavailable(perp_venue))?;
    let spot = directory.market_client(spot_venue);

    let domestic_coins = join_all(
        domestic
            .iter()
            .map(|domestic| domestic_coins(directory, *domestic)),
    )
    .await
    .into_iter()
    .flatten()
    .collect::<HashSet<_>>();

    let perp_listings = perp.markets().await?;
    let spot_listings = match &spot {
        Some(spot) => listings_or_empty(spot.as_ref()).await,
        None => Vec::new(),
    };

    let perp_ids = ids_for(&perp_listings, &domestic_coins);
    let perp_coins = perp_listings
        .iter()
        .map(|listing| listing.coin.clone())
        .filter(|coin| domestic_coins.contains(coin))
        .collect::<HashSet<_>>();
    let spot_ids = ids_for(&spot_listings, &perp_coins);

    let perp_feed = match perp_ids.is_empty() {
        true => None,
        false => Some(directory.quote_feed(perp_venue, perp_ids.clone())?),
    };
    let spot_feed = match spot_ids.is_empty() {
        true => None,
        false => match directory.quote_feed(spot_venue, spot_ids.clone()) {
            Ok(feed) => Some(feed),
            Err(error) => {
                warn!(venue = %spot_venue, error = %error, action = "pricing spot over rest", "spot feed unavailable");
                None
            }
        },
    };

    info!(
        exchange = %exchange,
        perp_symbols = perp_ids.len(),
        spot_symbols = spot_ids.len(),
        "shared overseas feeds ready"
    );

    Ok(SharedOverseas {
        exchange,
        spot,
        perp: Some(perp),
        spot_feed,
        perp_feed,
    })
}

/*----- */
// Shared domestic
/*----- */
#[derive(Debug)]
pub struct SharedDomestic {
    pub exchange: ExchangeId,
    pub feed: FeedHandle,
    pub symbols: Vec<String>,
}

/// One feed over every market the domestic exchange lists.
pub async fn build_shared_domestic(
    directory: &dyn VenueDirectory,
    exchange: ExchangeId,
) -> Result<SharedDomestic, WatchError> {
    let venue = Venue::spot(exchange);
    let client = directory
        .market_client(venue)
        .ok_or(WatchError::VenueUnavailable(venue))?;
    let symbols = client
        .markets()
        .await?
        .into_iter()
        .map(|listing| listing.id)
        .unique()
        .collect_vec();
    if symbols.is_empty() {
        return Err(WatchError::NoMarkets(exchange));
    }

    let feed = directory.quote_feed(venue, symbols.clone())?;
    info!(exchange = %exchange, symbols = symbols.len(), "shared domestic feed ready");
    Ok(SharedDomestic {
        exchange,
        feed,
        symbols,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock_data::test_utils::{FakeVenues, MockMarket, GATEIO_PERP_WS, GATEIO_SPOT_WS};
    use premia_data::{protocols::ws::channel::ChannelTransport, shared::utils::ManualClock};
    use std::time::Duration;

    fn venues() -> (Arc<ChannelTransport>, FakeVenues) {
        let transport = Arc::new(ChannelTransport::default());
        let venues = FakeVenues::new(transport.clone(), Arc::new(ManualClock::new(0)));
        (transport, venues)
    }

    #[tokio::test]
    async fn test_overseas_bundle_covers_domestic_coins() {
        let (transport, venues) = venues();
        let bithumb = Arc::new(MockMarket::new(Venue::spot(ExchangeId::Bithumb)));
        bithumb.list(&["BTC", "ETH"], "KRW");
        let upbit = Arc::new(MockMarket::new(Venue::spot(ExchangeId::Upbit)));
        upbit.fail_markets();
        let spot = Arc::new(MockMarket::new(Venue::spot(ExchangeId::Gateio)));
        spot.list(&["BTC", "DOGE"], "USDT");
        let perp = Arc::new(MockMarket::new(Venue::perp(ExchangeId::Gateio)));
        perp.list(&["BTC", "ETH", "DOGE"], "USDT");
        for market in [bithumb, upbit, spot, perp] {
            venues.add_market(market);
        }

        let bundle = build_shared_overseas(&venues, ExchangeId::Gateio, &ExchangeId::DOMESTIC)
            .await
            .unwrap();
        assert_eq!(
            bundle.perp_feed.as_ref().unwrap().symbols(),
            &["BTC_USDT".to_string(), "ETH_USDT".to_string()]
        );
        assert_eq!(bundle.spot_feed.as_ref().unwrap().symbols(), &["BTC_USDT".to_string()]);
        assert_eq!(bundle.feeds().count(), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.connect_count(GATEIO_PERP_WS), 1);
        assert_eq!(transport.connect_count(GATEIO_SPOT_WS), 1);

        bundle.close();
        assert!(bundle.feeds().all(FeedHandle::is_closed));
    }

    #[tokio::test]
    async fn test_overseas_bundle_failures() {
        let (_transport, venues) = venues();
        let missing = build_shared_overseas(&venues, ExchangeId::Bybit, &ExchangeId::DOMESTIC).await;
        assert!(matches!(missing, Err(WatchError::VenueUnavailable(_))));

        let perp = Arc::new(MockMarket::new(Venue::perp(ExchangeId::Bybit)));
        perp.fail_markets();
        venues.add_market(perp);
        let listing = build_shared_overseas(&venues, ExchangeId::Bybit, &ExchangeId::DOMESTIC).await;
        assert!(matches!(listing, Err(WatchError::Socket(_))));
    }

    #[tokio::test]
    async fn test_domestic_bundle() {
        let (transport, venues) = venues();
        let upbit = Arc::new(MockMarket::new(Venue::spot(ExchangeId::Upbit)));
        venues.add_market(upbit.clone());
        let empty = build_shared_domestic(&venues, ExchangeId::Upbit).await;
        assert!(matches!(empty, Err(WatchError::NoMarkets(ExchangeId::Upbit))));

        upbit.list(&["BTC", "XRP"], "KRW");
        let bundle = build_shared_domestic(&venues, ExchangeId::Upbit).await.unwrap();
        assert_eq!(bundle.symbols, vec!["BTC_KRW", "XRP_KRW"]);
        assert_eq!(bundle.feed.venue(), Venue::spot(ExchangeId::Upbit));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.total_connects(), 1);
    }
}
