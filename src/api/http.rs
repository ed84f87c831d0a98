//! HTTP/JSON implementation of the marketplace API.
//!
//! Wire DTOs live here; the polymorphic bidder reference is collapsed into
//! the tagged domain type once, at this boundary, so nothing downstream
//! branches on wire shape.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::MarketplaceApi;
use crate::error::ApiError;
use crate::models::{Auction, Bid, Bidder, BidderKind, HighestBid};

pub struct HttpMarketplaceApi {
    client: Client,
    base_url: String,
}

impl HttpMarketplaceApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn auction_url(&self, id: &str) -> String {
        format!("{}/auctions/{}", self.base_url, id)
    }

    fn bids_url(&self, auction_id: &str) -> String {
        format!("{}/auctions/{}/bids", self.base_url, auction_id)
    }
}

/// Response envelope: `{ "data": ... }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuctionDto {
    #[serde(rename = "_id")]
    id: String,
    highest_bid: Option<HighestBidDto>,
    starting_price: i64,
    reserve_price: i64,
    #[serde(default)]
    bids: Vec<BidDto>,
    auction_end_date: DateTime<Utc>,
    poster: BidderRefDto,
    #[serde(default)]
    verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighestBidDto {
    bidder: BidderRefDto,
    bidder_model: Option<String>,
    amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BidDto {
    #[serde(rename = "_id")]
    id: String,
    bidder: BidderRefDto,
    bidder_model: Option<String>,
    amount: i64,
    created_at: DateTime<Utc>,
}

/// A bidder reference arrives either as a bare id or as an expanded object,
/// depending on what the server populated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BidderRefDto {
    Object {
        #[serde(rename = "_id")]
        id: String,
        name: Option<String>,
        #[serde(rename = "storeName")]
        store_name: Option<String>,
    },
    Id(String),
}

impl BidderRefDto {
    fn into_bidder(self, model: Option<&str>) -> Bidder {
        let kind = match model {
            Some(m) if m.eq_ignore_ascii_case("vendor") => BidderKind::Vendor,
            _ => BidderKind::User,
        };
        match self {
            BidderRefDto::Id(id) => Bidder {
                kind,
                id,
                display_name: None,
            },
            BidderRefDto::Object {
                id,
                name,
                store_name,
            } => Bidder {
                kind,
                id,
                display_name: name.or(store_name),
            },
        }
    }
}

impl AuctionDto {
    fn into_auction(self) -> Auction {
        Auction {
            id: self.id,
            highest_bid: self.highest_bid.map(|h| HighestBid {
                amount: h.amount,
                bidder: h.bidder.into_bidder(h.bidder_model.as_deref()),
            }),
            starting_price: self.starting_price,
            reserve_price: self.reserve_price,
            bids: self
                .bids
                .into_iter()
                .map(|b| Bid {
                    id: b.id,
                    bidder: b.bidder.into_bidder(b.bidder_model.as_deref()),
                    amount: b.amount,
                    created_at: b.created_at,
                })
                .collect(),
            auction_end_date: self.auction_end_date,
            // Auctions are posted by vendor storefronts.
            poster: self.poster.into_bidder(Some("vendor")),
            verified: self.verified,
        }
    }
}

/// Map a non-success response onto the error taxonomy: a JSON body with a
/// `message` is a structured rejection, anything else is transport noise.
async fn rejection_from(response: Response) -> ApiError {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            message: Some(message),
        }) => ApiError::Rejected { message },
        _ => ApiError::Transport(format!("unexpected status {status}")),
    }
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceApi {
    async fn get_auction_by_id(&self, id: &str) -> Result<Auction, ApiError> {
        let url = self.auction_url(id);
        debug!(%url, "fetching auction");
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                auction_id: id.to_string(),
            }),
            status if status.is_success() => {
                let envelope: Envelope<AuctionDto> = response
                    .json()
                    .await
                    .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
                Ok(envelope.data.into_auction())
            }
            _ => Err(rejection_from(response).await),
        }
    }

    async fn place_bid(
        &self,
        auction_id: &str,
        amount: i64,
        token: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.bids_url(auction_id))
            .bearer_auth(token)
            .json(&json!({ "amount": amount }))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                auction_id: auction_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            _ => Err(rejection_from(response).await),
        }
    }

    async fn upgrade_bid(
        &self,
        auction_id: &str,
        amount: i64,
        token: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.bids_url(auction_id))
            .bearer_auth(token)
            .json(&json!({ "amount": amount }))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                auction_id: auction_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            _ => Err(rejection_from(response).await),
        }
    }
}
