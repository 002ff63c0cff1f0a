//! `!timba` argument parsing.

use crate::types::{Credits, Team, TimbaError};

/// A wager request typed in chat. An amount of zero cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetRequest {
    pub team: Team,
    pub amount: Credits,
}

/// Parse the tokens after the command word. Side and amount may come in
/// either order; anything after the second token is ignored.
pub fn parse_bet(args: &[&str]) -> Result<BetRequest, TimbaError> {
    let (first, second) = match args {
        [first, second, ..] => (*first, *second),
        _ => {
            return Err(TimbaError::InvalidBet(
                "expected a team and an amount".to_string(),
            ))
        }
    };

    let (amount, team) = if is_amount(first) {
        (first, second)
    } else if is_amount(second) {
        (second, first)
    } else {
        return Err(TimbaError::InvalidBet(format!(
            "no amount in '{first} {second}'"
        )));
    };

    let team: Team = team.parse()?;
    let amount: Credits = amount
        .parse()
        .map_err(|_| TimbaError::InvalidBet(format!("amount '{amount}' is too large")))?;

    Ok(BetRequest { team, amount })
}

fn is_amount(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_either_order() {
        assert_eq!(
            parse_bet(&["blue", "1000"]).unwrap(),
            BetRequest { team: Team::Blue, amount: 1000 }
        );
        assert_eq!(
            parse_bet(&["200", "r"]).unwrap(),
            BetRequest { team: Team::Red, amount: 200 }
        );
    }

    #[test]
    fn test_parse_zero_amount() {
        assert_eq!(parse_bet(&["red", "0"]).unwrap().amount, 0);
    }

    #[test]
    fn test_parse_ignores_extra_tokens() {
        assert_eq!(
            parse_bet(&["b", "10", "please"]).unwrap(),
            BetRequest { team: Team::Blue, amount: 10 }
        );
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse_bet(&[]).is_err());
        assert!(parse_bet(&["blue"]).is_err());
        assert!(parse_bet(&["bblue", "1000"]).is_err());
        assert!(parse_bet(&["blue", "onemillion"]).is_err());
        assert!(parse_bet(&["blue", "one", "million"]).is_err());
        assert!(parse_bet(&["blue", "-5"]).is_err());
        assert!(parse_bet(&["blue", "10.5"]).is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let err = parse_bet(&["red", "99999999999999999999999"]).unwrap_err();
        assert!(matches!(err, TimbaError::InvalidBet(_)));
    }
}
