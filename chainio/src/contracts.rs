//! Contract bindings for the Vigil protocol surface
//!
//! Generated from human-readable ABI fragments, covering only the
//! functions the reader and writer actually touch.

use ethers::contract::abigen;

abigen!(
    YieldAdapter,
    r#"[
        function getCurrentAPY() external view returns (uint256)
        function isHealthy() external view returns (bool)
        function getBalanceBreakdown() external view returns (uint256 principal, uint256 accruedYield, uint256 currentBalance)
    ]"#
);

abigen!(
    RiskRegistry,
    r#"[
        function getProtocolRisk(address protocol) external view returns (uint8 riskScore, uint8 threatLevel, uint256 lastUpdated, bool isActive)
        function batchUpdateRiskScores(address[] protocols, uint8[] scores, string[] reasons) external
        event RiskScoreUpdated(address indexed protocol, uint8 oldScore, uint8 newScore, uint8 threatLevel)
    ]"#
);

abigen!(
    ShieldVault,
    r#"[
        {
            "type": "function",
            "name": "getPoolAllocations",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [
                {
                    "name": "",
                    "type": "tuple[]",
                    "components": [
                        { "name": "adapter", "type": "address" },
                        { "name": "tier", "type": "uint8" },
                        { "name": "targetWeight", "type": "uint256" },
                        { "name": "currentAmount", "type": "uint256" },
                        { "name": "isActive", "type": "bool" }
                    ]
                }
            ]
        },
        {
            "type": "function",
            "name": "updatePoolWeight",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "adapter", "type": "address" },
                { "name": "newWeight", "type": "uint256" }
            ],
            "outputs": []
        },
        {
            "type": "function",
            "name": "rebalance",
            "stateMutability": "nonpayable",
            "inputs": [],
            "outputs": []
        },
        {
            "type": "function",
            "name": "partialWithdraw",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "adapter", "type": "address" },
                { "name": "percentageBps", "type": "uint256" },
                { "name": "reason", "type": "string" }
            ],
            "outputs": []
        },
        {
            "type": "function",
            "name": "emergencyWithdraw",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "adapter", "type": "address" },
                { "name": "reason", "type": "string" }
            ],
            "outputs": []
        }
    ]"#
);

abigen!(
    AggregatorV3,
    r#"[
        function latestRoundData() external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)
        function decimals() external view returns (uint8)
    ]"#
);
