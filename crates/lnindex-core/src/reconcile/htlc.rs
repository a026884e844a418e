//! HashedTimeLock reconcilers: assets, tokens, pairs and the HTLC lifecycle.
//!
//! HTLC states: `Open → Withdrawn` or `Open → Refunded`. Both are terminal;
//! a close event for an HTLC that is no longer open is skipped, so replaying
//! a withdraw or refund leaves the stored record untouched. A redelivered
//! create event for a closed HTLC is skipped the same way.

use tracing::{error, info, warn};

use super::{hex_id, missing, Outcome, Reconciler};
use crate::entity::{Asset, Collection, Htlc, HtlcState, Pair, Token};
use crate::error::{IndexerError, SkipReason};
use crate::event::{HtlcClose, HtlcNew, NewAsset, NewPair, NewToken};
use crate::store::{load_entity, WriteBatch};
use crate::types::EventEnvelope;

impl Reconciler {
    /// Upsert an asset. A repeated asset id overwrites the earlier record.
    pub async fn record_asset(
        &self,
        p: &NewAsset,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let asset = Asset {
            id: hex_id(&p.asset_id),
            name: p.name.clone(),
            decimals: p.decimal,
            created_at: env.block_timestamp,
            tx_hash: env.tx_hash.clone(),
        };
        let mut batch = WriteBatch::new();
        batch.put(&asset)?;
        info!(asset_id = %asset.id, name = %asset.name, "new asset");
        self.commit(batch).await
    }

    /// Upsert a token. A repeated token id overwrites the earlier record.
    pub async fn record_token(
        &self,
        p: &NewToken,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let token = Token {
            id: hex_id(&p.token),
            name: p.name.clone(),
            decimals: p.decimal,
            created_at: env.block_timestamp,
            tx_hash: env.tx_hash.clone(),
        };
        let mut batch = WriteBatch::new();
        batch.put(&token)?;
        info!(token_id = %token.id, name = %token.name, "new token");
        self.commit(batch).await
    }

    /// Link an existing asset and token into a pair.
    pub async fn record_pair(
        &self,
        p: &NewPair,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let pair_id = hex_id(&p.pair_id);
        let asset_id = hex_id(&p.asset_id);
        let token_id = hex_id(&p.token);
        let store = &*self.store;

        if load_entity::<Asset>(store, &asset_id).await?.is_none() {
            error!(%pair_id, %asset_id, "new pair: asset not found");
            return Ok(missing(Collection::Assets, asset_id));
        }
        if load_entity::<Token>(store, &token_id).await?.is_none() {
            error!(%pair_id, %token_id, "new pair: token not found");
            return Ok(missing(Collection::Tokens, token_id));
        }

        let pair = Pair {
            id: pair_id,
            asset: asset_id,
            token: token_id,
            created_at: env.block_timestamp,
            tx_hash: env.tx_hash.clone(),
        };
        let mut batch = WriteBatch::new();
        batch.put(&pair)?;
        info!(pair_id = %pair.id, "new pair");
        self.commit(batch).await
    }

    /// Open an HTLC on an existing pair.
    pub async fn create_htlc(
        &self,
        p: &HtlcNew,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let contract_id = hex_id(&p.hashlock);
        let pair_id = hex_id(&p.pair_id);

        if load_entity::<Pair>(&*self.store, &pair_id)
            .await?
            .is_none()
        {
            error!(%contract_id, %pair_id, "htlc new: pair not found");
            return Ok(missing(Collection::Pairs, pair_id));
        }

        if let Some(existing) = load_entity::<Htlc>(&*self.store, &contract_id).await? {
            let state = existing.state();
            if state != HtlcState::Open {
                warn!(%contract_id, state = state.as_str(), "htlc new: already closed");
                return Ok(Outcome::Skipped(SkipReason::AlreadyClosed {
                    id: contract_id,
                    state: state.as_str(),
                }));
            }
        }

        let htlc = Htlc {
            id: contract_id.clone(),
            sender: p.sender.clone(),
            receiver: p.receiver.clone(),
            pair: pair_id,
            amount: p.amount,
            hashlock: contract_id,
            timelock: p.timelock,
            node_pubkey: p.node_pubkey.clone(),
            withdrawn: false,
            refunded: false,
            preimage: None,
            watcher: None,
            created_at: env.block_timestamp,
            closed_at: None,
        };
        let mut batch = WriteBatch::new();
        batch.put(&htlc)?;
        info!(
            contract_id = %htlc.id,
            sender = %htlc.sender,
            receiver = %htlc.receiver,
            amount = %htlc.amount,
            "htlc new"
        );
        self.commit(batch).await
    }

    /// Close an open HTLC as withdrawn, recording the revealed preimage.
    pub async fn withdraw(
        &self,
        p: &HtlcClose,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let contract_id = hex_id(&p.contract_id);
        let mut htlc = match self.open_htlc(&contract_id, "withdraw").await? {
            Ok(htlc) => htlc,
            Err(skip) => return Ok(skip),
        };

        let state = self
            .contracts
            .htlc_state(&env.address, &contract_id)
            .await?;
        let preimage = state.preimage.ok_or_else(|| {
            IndexerError::ContractRead(format!(
                "contract '{contract_id}' reports no preimage for a withdrawn htlc"
            ))
        })?;

        htlc.withdrawn = true;
        htlc.preimage = Some(preimage);
        htlc.watcher = Some(state.watcher);
        htlc.closed_at = Some(env.block_timestamp);

        let mut batch = WriteBatch::new();
        batch.put(&htlc)?;
        info!(%contract_id, "htlc withdraw");
        self.commit(batch).await
    }

    /// Close an open HTLC as refunded.
    pub async fn refund(
        &self,
        p: &HtlcClose,
        env: &EventEnvelope,
    ) -> Result<Outcome, IndexerError> {
        let contract_id = hex_id(&p.contract_id);
        let mut htlc = match self.open_htlc(&contract_id, "refund").await? {
            Ok(htlc) => htlc,
            Err(skip) => return Ok(skip),
        };

        let state = self
            .contracts
            .htlc_state(&env.address, &contract_id)
            .await?;

        htlc.refunded = true;
        htlc.watcher = Some(state.watcher);
        htlc.closed_at = Some(env.block_timestamp);

        let mut batch = WriteBatch::new();
        batch.put(&htlc)?;
        info!(%contract_id, "htlc refund");
        self.commit(batch).await
    }

    /// Load an HTLC that is still open, or the skip outcome explaining why not.
    async fn open_htlc(
        &self,
        contract_id: &str,
        action: &str,
    ) -> Result<Result<Htlc, Outcome>, IndexerError> {
        let Some(htlc) = load_entity::<Htlc>(&*self.store, contract_id).await? else {
            error!(%contract_id, "htlc {action}: htlc not found");
            return Ok(Err(missing(Collection::Htlcs, contract_id)));
        };
        match htlc.state() {
            HtlcState::Open => Ok(Ok(htlc)),
            closed => {
                warn!(%contract_id, state = closed.as_str(), "htlc {action}: already closed");
                Ok(Err(Outcome::Skipped(SkipReason::AlreadyClosed {
                    id: contract_id.to_string(),
                    state: closed.as_str(),
                })))
            }
        }
    }
}
