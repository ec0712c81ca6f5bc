//! Bridge simulation between two in-process chains
//!
//! The source chain's [`SpokePool`] takes custody of deposited tokens. A
//! [`Relayer`] fronts the output amount on the destination chain, where the
//! spoke pool calls the receiving pool's `handleV3AcrossMessage`, then is
//! repaid from the custody on the source chain. A deposit nobody fills before
//! its deadline can be expired, which sends the tokens to the deposit's
//! refund address (the pool's escrow).
//!
//! Fill and repayment are two transactions on two chains; a destination
//! revert leaves the deposit pending on the source.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::abi::IEAcrossHandler;
use crate::chain::Chain;
use crate::errors::PoolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositStatus {
    Pending,
    Filled,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub depositor: Address,
    /// Pool credited on the destination chain
    pub recipient: Address,
    pub refund_address: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub input_amount: U256,
    pub output_amount: U256,
    pub destination_chain_id: u64,
    /// Last timestamp at which the deposit may be filled
    pub fill_deadline: u64,
    pub message: Bytes,
    pub status: DepositStatus,
}

/// Deposit custody of one chain.
#[derive(Debug, Clone)]
pub struct SpokePool {
    address: Address,
    next_id: u32,
    deposits: BTreeMap<u32, Deposit>,
}

impl SpokePool {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next_id: 0,
            deposits: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Record a deposit whose input tokens were already transferred here.
    pub fn deposit(&mut self, deposit: Deposit) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.deposits.insert(id, deposit);
        id
    }

    pub fn get(&self, id: u32) -> Option<&Deposit> {
        self.deposits.get(&id)
    }

    pub fn deposits(&self) -> impl Iterator<Item = (u32, &Deposit)> {
        self.deposits.iter().map(|(id, deposit)| (*id, deposit))
    }

    fn pending(&self, id: u32) -> Result<&Deposit, PoolError> {
        let deposit = self.deposits.get(&id).ok_or(PoolError::UnknownDeposit(id))?;
        if deposit.status != DepositStatus::Pending {
            return Err(PoolError::DepositNotPending(id));
        }
        Ok(deposit)
    }

    fn settle(&mut self, id: u32, status: DepositStatus) -> Result<Deposit, PoolError> {
        self.pending(id)?;
        let deposit = self
            .deposits
            .get_mut(&id)
            .ok_or(PoolError::UnknownDeposit(id))?;
        deposit.status = status;
        Ok(deposit.clone())
    }

    /// Refund an unfilled deposit past its deadline to its refund address.
    pub fn expire(chain: &mut Chain, id: u32) -> Result<(), PoolError> {
        let origin = chain.env().config.spoke_pool;
        chain.transact(origin, |tx| {
            let now = tx.state.timestamp;
            let deadline = tx.state.spoke_pool.pending(id)?.fill_deadline;
            if now <= deadline {
                return Err(PoolError::DepositNotExpired(id));
            }
            let deposit = tx.state.spoke_pool.settle(id, DepositStatus::Refunded)?;
            let custody = tx.state.spoke_pool.address();
            tx.state.ledger.transfer(
                deposit.input_token,
                custody,
                deposit.refund_address,
                deposit.input_amount,
            )?;
            info!(
                deposit_id = id,
                refund_address = ?deposit.refund_address,
                amount = %deposit.input_amount,
                "deposit expired and refunded"
            );
            Ok(())
        })
    }
}

/// Off-chain actor filling deposits with its own inventory.
#[derive(Debug, Clone, Copy)]
pub struct Relayer {
    pub address: Address,
}

impl Relayer {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Fill deposit `id` of `source` on `destination`, then claim repayment.
    pub fn fill(&self, source: &mut Chain, destination: &mut Chain, id: u32) -> Result<(), PoolError> {
        let deposit = source.state().spoke_pool.pending(id)?.clone();
        if source.state().timestamp > deposit.fill_deadline {
            return Err(PoolError::DepositExpired(id));
        }
        if deposit.destination_chain_id != destination.chain_id() {
            return Err(PoolError::WrongDestinationChain {
                expected: deposit.destination_chain_id,
                actual: destination.chain_id(),
            });
        }

        let relayer = self.address;
        let calldata = IEAcrossHandler::handleV3AcrossMessageCall {
            tokenSent: deposit.output_token,
            amount: deposit.output_amount,
            relayer,
            message: deposit.message.clone(),
        }
        .abi_encode();

        let filled = destination.transact(relayer, |tx| {
            let spoke_pool = tx.env.config.spoke_pool;
            tx.state.ledger.transfer(
                deposit.output_token,
                relayer,
                deposit.recipient,
                deposit.output_amount,
            )?;
            tx.call(spoke_pool, deposit.recipient, &calldata)
        });
        if let Err(err) = filled {
            warn!(deposit_id = id, error = %err, "fill reverted on destination");
            return Err(err);
        }

        source.transact(relayer, |tx| {
            let deposit = tx.state.spoke_pool.settle(id, DepositStatus::Filled)?;
            let custody = tx.state.spoke_pool.address();
            tx.state
                .ledger
                .transfer(deposit.input_token, custody, relayer, deposit.input_amount)?;
            Ok(())
        })?;

        info!(
            deposit_id = id,
            relayer = ?relayer,
            destination_chain_id = deposit.destination_chain_id,
            amount = %deposit.output_amount,
            "deposit filled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosschain::codec::{DestinationParams, Message, OpType};
    use crate::testutil::*;

    const FUNDS: u64 = 100_000;

    fn transfer_message() -> Bytes {
        Message {
            params: DestinationParams {
                op_type: OpType::Transfer,
                should_unwrap_native: false,
            },
            source_chain_id: U256::from(1),
            source_nav: U256::from(1_000_000u64),
            source_decimals: 6,
            nav_tolerance: U256::ZERO,
        }
        .encode()
    }

    /// Two chains with the same pool, and a custody-backed deposit 1 -> 10.
    fn setup() -> (Chain, Chain, Address, u32) {
        let (mut source, pool) = usdc_pool_chain();
        let (mut destination, _) = test_chain(10);
        let remote = destination.deploy_pool(usdc_pool_params()).unwrap();
        assert_eq!(pool, remote);

        let refund_address = Address::repeat_byte(0xe5);
        fund(&mut source, USDC, SPOKE_POOL, FUNDS);
        let deadline = source.state().timestamp + 3_600;
        let id = source.state_mut().spoke_pool.deposit(Deposit {
            depositor: pool,
            recipient: pool,
            refund_address,
            input_token: USDC,
            output_token: USDC,
            input_amount: U256::from(FUNDS),
            output_amount: U256::from(FUNDS - 100),
            destination_chain_id: 10,
            fill_deadline: deadline,
            message: transfer_message(),
            status: DepositStatus::Pending,
        });
        fund(&mut destination, USDC, RELAYER, FUNDS);
        (source, destination, pool, id)
    }

    #[test]
    fn test_fill_pays_pool_and_relayer() {
        let (mut source, mut destination, pool, id) = setup();
        Relayer::new(RELAYER).fill(&mut source, &mut destination, id).unwrap();

        assert_eq!(destination.balance(USDC, pool), U256::from(FUNDS - 100));
        assert_eq!(destination.balance(USDC, RELAYER), U256::from(100));
        assert_eq!(source.balance(USDC, RELAYER), U256::from(FUNDS));
        assert_eq!(source.balance(USDC, SPOKE_POOL), U256::ZERO);
        assert_eq!(source.state().spoke_pool.get(id).unwrap().status, DepositStatus::Filled);

        let err = Relayer::new(RELAYER).fill(&mut source, &mut destination, id).unwrap_err();
        assert_eq!(err, PoolError::DepositNotPending(id));
    }

    #[test]
    fn test_fill_on_wrong_chain() {
        let (mut source, _, _, id) = setup();
        let (mut elsewhere, _) = test_chain(137);
        let err = Relayer::new(RELAYER).fill(&mut source, &mut elsewhere, id).unwrap_err();
        assert_eq!(err, PoolError::WrongDestinationChain { expected: 10, actual: 137 });
    }

    #[test]
    fn test_destination_revert_keeps_deposit_pending() {
        let (mut source, mut destination, _, id) = setup();
        // relayer without inventory
        destination.state_mut().ledger = crate::ledger::Ledger::new(WETH);
        assert!(Relayer::new(RELAYER).fill(&mut source, &mut destination, id).is_err());
        assert_eq!(source.state().spoke_pool.get(id).unwrap().status, DepositStatus::Pending);
        assert_eq!(source.balance(USDC, SPOKE_POOL), U256::from(FUNDS));
    }

    #[test]
    fn test_expire_only_after_deadline() {
        let (mut source, mut destination, _, id) = setup();
        assert_eq!(SpokePool::expire(&mut source, id), Err(PoolError::DepositNotExpired(id)));

        source.advance_time(3_601);
        let err = Relayer::new(RELAYER).fill(&mut source, &mut destination, id).unwrap_err();
        assert_eq!(err, PoolError::DepositExpired(id));

        SpokePool::expire(&mut source, id).unwrap();
        let refund_address = source.state().spoke_pool.get(id).unwrap().refund_address;
        assert_eq!(source.balance(USDC, refund_address), U256::from(FUNDS));
        assert_eq!(SpokePool::expire(&mut source, id), Err(PoolError::DepositNotPending(id)));
    }

    #[test]
    fn test_unknown_deposit() {
        let (mut source, _) = test_chain(1);
        assert_eq!(SpokePool::expire(&mut source, 7), Err(PoolError::UnknownDeposit(7)));
    }
}
