//! Solidity-facing interfaces and wire structs
//!
//! Calldata for pool methods, extension and adapter entry points, and the
//! cross-chain message envelope are all ABI-encoded with these definitions.
//! Domain types live next to the code that uses them and convert to/from
//! the structs here at the boundary. Everything sits in one `sol!` block so
//! function selectors can resolve the struct types they reference.

use alloy_sol_types::sol;

sol! {
    // ============================================
    // WIRE STRUCTS
    // ============================================

    /// Parameters the destination pool acts on.
    /// `opType`: 0 = Transfer, 1 = Sync, 2 = Unknown.
    #[derive(Debug, PartialEq, Eq)]
    struct DestinationMessageParams {
        uint8 opType;
        bool shouldUnwrapNative;
    }

    /// Parameters the pool owner supplies when initiating a bridge deposit.
    #[derive(Debug, PartialEq, Eq)]
    struct SourceMessageParams {
        uint8 opType;
        uint256 navTolerance;
        uint256 sourceNativeAmount;
        bool shouldUnwrapOnDestination;
    }

    /// Versioned envelope carried in the bridge `message` bytes.
    #[derive(Debug, PartialEq, Eq)]
    struct CrosschainMessage {
        uint8 version;
        DestinationMessageParams params;
        uint256 sourceChainId;
        uint256 sourceNav;
        uint8 sourceDecimals;
        uint256 navTolerance;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct NavComponents {
        uint256 unitaryValue;
        uint256 totalSupply;
        address baseToken;
        uint8 decimals;
        uint256 netTotalValue;
        uint256 netTotalLiabilities;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct AppTokenBalance {
        address token;
        int256 amount;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct AppTokenBalances {
        AppTokenBalance[] balances;
        uint256 appType;
    }

    /// Across-style deposit request built by the intents adapter.
    #[derive(Debug, PartialEq, Eq)]
    struct AcrossParams {
        address inputToken;
        address outputToken;
        uint256 inputAmount;
        uint256 outputAmount;
        uint256 destinationChainId;
        uint32 fillDeadline;
        SourceMessageParams sourceParams;
    }

    // ============================================
    // POOL (native methods)
    // ============================================

    #[allow(missing_docs)]
    interface ISmartPool {
        function mint(address recipient, uint256 amountIn, uint256 amountOutMin) external payable returns (uint256);
        function burn(uint256 amountIn, uint256 amountOutMin) external returns (uint256);
        function updateUnitaryValue() external returns (NavComponents);
        function purgeInactiveTokensAndApps() external;
        function getActiveTokens() external view returns (address[]);
    }

    // ============================================
    // EXTENSIONS (fixed selector map)
    // ============================================

    #[allow(missing_docs)]
    interface IECrosschain {
        function donate(address token, uint256 amount, DestinationMessageParams params) external payable;
    }

    #[allow(missing_docs)]
    interface IEAcrossHandler {
        function handleV3AcrossMessage(address tokenSent, uint256 amount, address relayer, bytes message) external;
    }

    #[allow(missing_docs)]
    interface IEApps {
        function getAppTokenBalances(uint256 packedApplications) external returns (AppTokenBalances[]);
    }

    #[allow(missing_docs)]
    interface IENavView {
        function getNavDataView() external view returns (NavComponents);
    }

    #[allow(missing_docs)]
    interface IEOracle {
        function hasPriceFeed(address token) external view returns (bool);
        function convertTokenAmount(address token, int256 amount, address targetToken) external view returns (int256);
    }

    // ============================================
    // ADAPTERS (authority registry)
    // ============================================

    #[allow(missing_docs)]
    interface IAIntents {
        function depositV3(AcrossParams params) external payable;
    }

    #[allow(missing_docs)]
    interface IAStaking {
        function stake(uint256 amount) external;
        function undelegateStake(uint256 amount) external;
    }

    // ============================================
    // ESCROW
    // ============================================

    #[allow(missing_docs)]
    interface IEscrow {
        function refundVault(address token) external;
    }
}
