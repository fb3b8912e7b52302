use serde::Deserialize;

use crate::{Error, Instrument, Market, Provider, Result};

/// Read-only instrument universe shared by every request handler.
#[derive(Debug, Clone)]
pub struct Universe {
    instruments: Vec<Instrument>,
}

/// `[[instrument]]` entries of the TOML config file.
///
/// ```toml
/// [[instrument]]
/// id = "bitcoin"
/// symbol = "BTC"
/// name = "Bitcoin"
/// market = "crypto"
/// exchange = "BINANCE"
/// provider = "binance"
/// code = "BTCUSDT"
/// ```
#[derive(Debug, Deserialize)]
struct UniverseFile {
    #[serde(default, rename = "instrument")]
    instruments: Vec<Instrument>,
}

impl Universe {
    pub fn new(instruments: Vec<Instrument>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for inst in &instruments {
            if !seen.insert(inst.id.as_str()) {
                return Err(Error::Config(format!("duplicate instrument id '{}'", inst.id)));
            }
        }
        Ok(Self { instruments })
    }

    /// Parse the `[[instrument]]` list from TOML text. An empty list falls back to
    /// the built-in universe.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: UniverseFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid universe config: {e}")))?;
        if file.instruments.is_empty() {
            return Ok(Self::builtin());
        }
        Self::new(file.instruments)
    }

    pub fn all(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn find(&self, id: &str) -> Result<&Instrument> {
        self.instruments
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::InstrumentNotFound(id.to_string()))
    }

    /// Instruments of one market, or all of them when `market` is `None`.
    pub fn select(&self, market: Option<Market>) -> Vec<Instrument> {
        self.instruments
            .iter()
            .filter(|i| market.map_or(true, |m| i.market == m))
            .cloned()
            .collect()
    }

    /// Crypto pairs quoted by Binance plus A-share and H-share names quoted by Tencent.
    pub fn builtin() -> Self {
        let crypto = [
            ("bitcoin", "BTC", "Bitcoin", "BTCUSDT"),
            ("ethereum", "ETH", "Ethereum", "ETHUSDT"),
            ("binancecoin", "BNB", "BNB", "BNBUSDT"),
            ("solana", "SOL", "Solana", "SOLUSDT"),
            ("ripple", "XRP", "XRP", "XRPUSDT"),
            ("cardano", "ADA", "Cardano", "ADAUSDT"),
            ("dogecoin", "DOGE", "Dogecoin", "DOGEUSDT"),
            ("polkadot", "DOT", "Polkadot", "DOTUSDT"),
        ];
        let stocks = [
            ("sh600519", "贵州茅台", "Kweichow Moutai", "Liquor"),
            ("sh600036", "招商银行", "China Merchants Bank", "Banking"),
            ("sh601318", "中国平安", "Ping An Insurance", "Insurance"),
            ("sh600900", "长江电力", "China Yangtze Power", "Utilities"),
            ("sz000858", "五粮液", "Wuliangye Yibin", "Liquor"),
            ("sz000333", "美的集团", "Midea Group", "Consumer"),
            ("sz002594", "比亚迪", "BYD", "New Energy"),
            ("sh688041", "中芯国际", "SMIC", "Tech"),
            ("hk00700", "腾讯控股", "Tencent", "Tech"),
            ("hk09988", "阿里巴巴", "Alibaba", "Tech"),
            ("hk00981", "中国移动", "China Mobile", "Telecom"),
            ("hk00939", "建设银行", "CCB", "Banking"),
            ("hk01810", "小米集团", "Xiaomi", "Tech"),
            ("hk03690", "美团", "Meituan", "Consumer"),
            ("hk02318", "中国平安(港)", "Ping An (HK)", "Insurance"),
            ("hk02020", "安踏体育", "ANTA", "Apparel"),
        ];

        let mut instruments: Vec<Instrument> = crypto
            .iter()
            .map(|&(id, symbol, name, pair)| Instrument {
                id: id.into(),
                symbol: symbol.into(),
                name: name.into(),
                market: Market::Crypto,
                exchange: "BINANCE".into(),
                provider: Provider::Binance,
                code: pair.into(),
                sector: None,
            })
            .collect();

        instruments.extend(stocks.iter().map(|&(code, symbol, name, sector)| {
            let (market, exchange) = match &code[..2] {
                "hk" => (Market::HShare, "HK"),
                "sz" => (Market::AShare, "SZ"),
                _ => (Market::AShare, "SH"),
            };
            Instrument {
                id: code.into(),
                symbol: symbol.into(),
                name: name.into(),
                market,
                exchange: exchange.into(),
                provider: Provider::Tencent,
                code: code.into(),
                sector: Some(sector.into()),
            }
        }));

        Self { instruments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_unique_and_resolvable() {
        let universe = Universe::builtin();
        let rebuilt = Universe::new(universe.all().to_vec());
        assert!(rebuilt.is_ok());
        assert_eq!(universe.find("hk00700").unwrap().market, Market::HShare);
        assert_eq!(universe.find("sz000858").unwrap().exchange, "SZ");
        assert_eq!(universe.find("bitcoin").unwrap().code, "BTCUSDT");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let universe = Universe::builtin();
        assert!(matches!(
            universe.find("nope"),
            Err(Error::InstrumentNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn select_filters_by_market() {
        let universe = Universe::builtin();
        let crypto = universe.select(Some(Market::Crypto));
        assert_eq!(crypto.len(), 8);
        assert!(crypto.iter().all(|i| i.provider == Provider::Binance));
        assert_eq!(universe.select(None).len(), universe.all().len());
    }

    #[test]
    fn parses_instruments_from_toml() {
        let toml = r#"
            [signals]
            short_window = 5

            [[instrument]]
            id = "bitcoin"
            symbol = "BTC"
            name = "Bitcoin"
            market = "crypto"
            exchange = "COINGECKO"
            provider = "coingecko"
            code = "bitcoin"
        "#;
        let universe = Universe::from_toml_str(toml).unwrap();
        assert_eq!(universe.all().len(), 1);
        assert_eq!(universe.all()[0].provider, Provider::CoinGecko);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let toml = r#"
            [[instrument]]
            id = "x"
            symbol = "X"
            name = "X"
            market = "crypto"
            exchange = "BINANCE"
            provider = "binance"
            code = "XUSDT"

            [[instrument]]
            id = "x"
            symbol = "X"
            name = "X"
            market = "crypto"
            exchange = "BINANCE"
            provider = "binance"
            code = "XUSDT"
        "#;
        assert!(matches!(Universe::from_toml_str(toml), Err(Error::Config(_))));
    }
}
