use std::str::FromStr;

use bitcoin::{Address, Amount, address::NetworkUnchecked, amount::Denomination};
use tracing::debug;
use url::form_urlencoded;

use crate::{ensure_input, network::BitcoinNetwork};

use super::{ClassificationError, ClassificationResult};

/// A decoded BIP-21 URI, scheme already stripped.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Bip21Uri {
    /// The address and the network it belongs to. `None` for
    /// `bitcoin:?lightning=...` URIs.
    pub address: Option<(String, BitcoinNetwork)>,
    pub amount_sat: Option<u64>,
    pub label: Option<String>,
    pub message: Option<String>,
    /// Raw value of the `lightning` parameter.
    pub lightning: Option<String>,
    pub ignored_params: Vec<String>,
}

/// Parses `address[?params]`. The address must belong to `network`.
pub(crate) fn parse_bip21(input: &str, network: BitcoinNetwork) -> ClassificationResult<Bip21Uri> {
    let (address, query) = input.split_once('?').unwrap_or((input, ""));
    let mut uri = Bip21Uri {
        address: match address.trim() {
            "" => None,
            address => Some(parse_address(address, network)?),
        },
        ..Default::default()
    };

    let mut required = Vec::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.to_ascii_lowercase().as_str() {
            "amount" => {
                ensure_input!(uri.amount_sat.is_none(), ClassificationError::Malformed);
                uri.amount_sat = Some(parse_amount(&value)?);
            }
            "label" => uri.label = Some(value.into_owned()),
            "message" => uri.message = Some(value.into_owned()),
            "lightning" => uri.lightning = Some(value.trim().to_string()),
            unknown if unknown.starts_with("req-") => required.push(key.into_owned()),
            _ => {
                debug!("Ignoring unknown BIP-21 parameter {key}");
                uri.ignored_params.push(key.into_owned());
            }
        }
    }

    if !required.is_empty() {
        return Err(ClassificationError::UnhandledRequiredParams { params: required });
    }
    ensure_input!(
        uri.address.is_some() || uri.lightning.is_some(),
        ClassificationError::Malformed
    );
    Ok(uri)
}

fn parse_address(
    address: &str,
    network: BitcoinNetwork,
) -> ClassificationResult<(String, BitcoinNetwork)> {
    let unchecked =
        Address::<NetworkUnchecked>::from_str(address).map_err(|_| ClassificationError::Malformed)?;
    if unchecked.is_valid_for_network(network.into()) {
        return Ok((address.to_string(), network));
    }

    let actual = BitcoinNetwork::ALL
        .into_iter()
        .find(|candidate| unchecked.is_valid_for_network((*candidate).into()))
        .ok_or(ClassificationError::Malformed)?;
    Err(ClassificationError::ChainMismatch {
        expected: network,
        actual,
    })
}

/// BIP-21 amounts are decimal BTC.
fn parse_amount(value: &str) -> ClassificationResult<u64> {
    Amount::from_str_in(value.trim(), Denomination::Bitcoin)
        .map(Amount::to_sat)
        .map_err(|_| ClassificationError::Malformed)
}
