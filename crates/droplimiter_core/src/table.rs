//! # Drop Table
//!
//! The static description of every managed drop: which item, how often, how
//! many may be outstanding, and which shared pools it draws from.
//!
//! ## File Format
//!
//! ```text
//! # comments and blank lines are ignored
//! pool   weapons   5
//! pool   rares     2
//!
//! drop Ancient Sword: 1234 3%/day limit 2/week pool weapons,rares
//! drop Healing Herb:  88   25%/6hour
//! ```
//!
//! A `drop` line is `drop <description>: <item> <percent>%/<timeframe>`
//! followed by optional `limit <max>/<timeframe>` and `pool <a>,<b>` clauses.
//! A `pool` line is `pool <name> <capacity>`.
//!
//! Everything is validated at load time. A table that loads is a table the
//! engine can run without a single error path.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{LimiterError, LimiterResult};
use crate::percent::Percent;
use crate::timeframe::TimeFrame;

/// Unique identifier for an item type.
pub type ItemId = u32;

/// The chance, per full window, that one trial succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropRate {
    /// Chance of one drop per window.
    pub percent: Percent,
    /// The window the chance applies to.
    pub window: TimeFrame,
}

impl DropRate {
    /// Creates a drop rate.
    #[inline]
    #[must_use]
    pub const fn new(percent: Percent, window: TimeFrame) -> Self {
        Self { percent, window }
    }

    /// Parses a rate such as `3%/day` or `5%/2hour`.
    ///
    /// # Errors
    ///
    /// Returns the percent or time frame error, or `InvalidPercent` if the
    /// rate exceeds 100%.
    pub fn parse(token: &str) -> LimiterResult<Self> {
        let (percent, window) = split_pair(token).ok_or_else(|| LimiterError::InvalidPercent {
            token: token.to_string(),
            reason: "expected a rate like [3%/day] or [5%/2hour]".to_string(),
        })?;

        let percent = Percent::parse(percent)?;
        if percent > Percent::HUNDRED {
            return Err(LimiterError::InvalidPercent {
                token: token.to_string(),
                reason: "a rate cannot exceed 100%".to_string(),
            });
        }

        Ok(Self::new(percent, TimeFrame::parse(window)?))
    }
}

impl fmt::Display for DropRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%/{}", self.percent, self.window)
    }
}

/// At most `max` drops may be unexpired at once, where a drop expires once it
/// is older than `window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limit {
    /// Maximum number of unexpired drops.
    pub max: u32,
    /// How long a drop counts against the limit.
    pub window: TimeFrame,
}

impl Limit {
    /// Parses a limit such as `3/week`.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidLimit` for a malformed token or a zero
    /// or unparseable maximum, and `LimiterError::InvalidTimeFrame` for a bad
    /// window.
    pub fn parse(token: &str) -> LimiterResult<Self> {
        let invalid = |reason: &str| LimiterError::InvalidLimit {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        let (max, window) = split_pair(token).ok_or_else(|| invalid("expected a limit like [3/week]"))?;
        let max: u32 = max
            .parse()
            .map_err(|_| invalid("limit maximum must be a whole number"))?;
        if max == 0 {
            return Err(invalid("limit maximum must be positive"));
        }

        Ok(Self {
            max,
            window: TimeFrame::parse(window)?,
        })
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.max, self.window)
    }
}

/// A named ceiling on the combined deficit of every item assigned to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    /// Pool name, referenced from drop lines.
    pub name: String,
    /// Maximum combined deficit before the pool counts as full.
    pub capacity: u32,
}

impl Pool {
    /// Creates a pool.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// The drop settings for one item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropSpec {
    /// The item this drop creates.
    pub item_id: ItemId,
    /// Human-readable label for logs and reports.
    pub description: String,
    /// How often the item drops.
    pub rate: DropRate,
    /// Optional cap on unexpired drops.
    pub limit: Option<Limit>,
    /// Pools this item draws from, in declaration order, without duplicates.
    pub pool_names: Vec<String>,
}

impl DropSpec {
    /// Creates an unlimited drop that belongs to no pool.
    #[must_use]
    pub fn new(item_id: ItemId, description: impl Into<String>, rate: DropRate) -> Self {
        Self {
            item_id,
            description: description.into(),
            rate,
            limit: None,
            pool_names: Vec::new(),
        }
    }

    /// Sets the limit.
    #[must_use]
    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Adds pool memberships, skipping names already present.
    #[must_use]
    pub fn with_pools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.pool_names.contains(&name) {
                self.pool_names.push(name);
            }
        }
        self
    }

    /// Returns true if the drop belongs to the named pool.
    #[must_use]
    pub fn in_pool(&self, name: &str) -> bool {
        self.pool_names.iter().any(|p| p == name)
    }
}

/// Every drop and pool managed by one run, validated as a whole.
#[derive(Clone, Debug, Default)]
pub struct DropTable {
    drops: Vec<DropSpec>,
    pools: Vec<Pool>,
}

impl DropTable {
    /// Builds a table, checking cross references.
    ///
    /// # Errors
    ///
    /// - `DuplicateItem` if two drops share an item id
    /// - `DuplicatePool` if two pools share a name
    /// - `UnknownPool` if a drop names an undeclared pool
    pub fn new(drops: Vec<DropSpec>, pools: Vec<Pool>) -> LimiterResult<Self> {
        check_references(&drops, &pools).map_err(|(_, e)| e)?;
        Ok(Self { drops, pools })
    }

    /// Parses a whole drop file.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::Parse` naming the first bad line. Duplicate
    /// items and pools and unknown pool references name the offending line
    /// too.
    pub fn parse(text: &str) -> LimiterResult<Self> {
        let mut drops = Vec::new();
        let mut pools = Vec::new();
        let mut drop_lines = Vec::new();
        let mut pool_lines = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fail = |reason: String| LimiterError::Parse {
                line: index + 1,
                content: line.to_string(),
                reason,
            };

            let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            match keyword {
                "drop" => {
                    drops.push(parse_drop(rest).map_err(fail)?);
                    drop_lines.push((index + 1, line));
                }
                "pool" => {
                    pools.push(parse_pool(rest).map_err(fail)?);
                    pool_lines.push((index + 1, line));
                }
                _ => return Err(fail("expected a [drop] or [pool] declaration".to_string())),
            }
        }

        check_references(&drops, &pools).map_err(|(entry, e)| {
            let (line, content) = match entry {
                Entry::Drop(i) => drop_lines[i],
                Entry::Pool(i) => pool_lines[i],
            };
            LimiterError::Parse {
                line,
                content: content.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self { drops, pools })
    }

    /// Reads and parses a drop file.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::Storage` if the file cannot be read, otherwise
    /// the errors of [`DropTable::parse`].
    pub fn load(path: impl AsRef<Path>) -> LimiterResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            LimiterError::Storage(format!("failed to read drop table {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// All drops, in file order.
    pub fn iter(&self) -> impl Iterator<Item = &DropSpec> {
        self.drops.iter()
    }

    /// All pools, in file order.
    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.iter()
    }

    /// Item ids of every drop, in file order.
    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.drops.iter().map(|d| d.item_id)
    }

    /// Number of drops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drops.len()
    }

    /// Returns true if the table has no drops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }

    /// Finds the drop for an item.
    #[must_use]
    pub fn find_by_item_id(&self, item_id: ItemId) -> Option<&DropSpec> {
        self.drops.iter().find(|d| d.item_id == item_id)
    }

    /// Finds a pool by name.
    #[must_use]
    pub fn find_pool_by_name(&self, name: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// The pools a drop belongs to, in the order the drop lists them.
    pub fn pools_for<'a>(&'a self, spec: &'a DropSpec) -> impl Iterator<Item = &'a Pool> + 'a {
        spec.pool_names
            .iter()
            .filter_map(move |name| self.find_pool_by_name(name))
    }

    /// The drops assigned to a pool.
    pub fn specs_for<'a>(&'a self, pool: &'a Pool) -> impl Iterator<Item = &'a DropSpec> + 'a {
        self.drops.iter().filter(move |d| d.in_pool(&pool.name))
    }
}

/// Position of a declaration that failed cross-reference checks.
#[derive(Clone, Copy, Debug)]
enum Entry {
    Drop(usize),
    Pool(usize),
}

/// Rejects duplicate items, duplicate pools and references to undeclared
/// pools, reporting which declaration is at fault.
fn check_references(drops: &[DropSpec], pools: &[Pool]) -> Result<(), (Entry, LimiterError)> {
    let mut pool_names = HashSet::new();
    for (i, pool) in pools.iter().enumerate() {
        if !pool_names.insert(pool.name.as_str()) {
            return Err((Entry::Pool(i), LimiterError::DuplicatePool(pool.name.clone())));
        }
    }

    let mut items = HashSet::new();
    for (i, drop) in drops.iter().enumerate() {
        if !items.insert(drop.item_id) {
            return Err((Entry::Drop(i), LimiterError::DuplicateItem(drop.item_id)));
        }
        if let Some(missing) = drop.pool_names.iter().find(|p| !pool_names.contains(p.as_str())) {
            return Err((
                Entry::Drop(i),
                LimiterError::UnknownPool {
                    item_id: drop.item_id,
                    pool: missing.clone(),
                },
            ));
        }
    }

    Ok(())
}

/// Splits `a/b` into exactly two non-empty halves.
fn split_pair(token: &str) -> Option<(&str, &str)> {
    let (left, right) = token.split_once('/')?;
    if left.is_empty() || right.is_empty() || right.contains('/') {
        return None;
    }
    Some((left, right))
}

/// Parses everything after the `drop` keyword.
fn parse_drop(rest: &str) -> Result<DropSpec, String> {
    let (description, body) = rest
        .split_once(':')
        .ok_or_else(|| "expected [drop <description>: <item> <rate>]".to_string())?;

    let description = description.trim();
    if description.is_empty() {
        return Err("missing description".to_string());
    }

    let mut tokens = body.split_whitespace();

    let item_id: ItemId = tokens
        .next()
        .ok_or_else(|| "missing item id".to_string())?
        .parse()
        .map_err(|_| "item id must be a whole number".to_string())?;

    let rate = tokens.next().ok_or_else(|| "missing drop rate".to_string())?;
    let rate = DropRate::parse(rate).map_err(|e| e.to_string())?;

    let mut spec = DropSpec::new(item_id, description, rate);
    let mut seen_pool = false;

    while let Some(key) = tokens.next() {
        let value = tokens
            .next()
            .ok_or_else(|| format!("[{key}] has no value"))?;

        match key.to_ascii_lowercase().as_str() {
            "limit" => {
                if spec.limit.is_some() {
                    return Err("limit given more than once".to_string());
                }
                spec.limit = Some(Limit::parse(value).map_err(|e| e.to_string())?);
            }
            "pool" => {
                if seen_pool {
                    return Err("pool given more than once".to_string());
                }
                seen_pool = true;
                let names: Vec<&str> = value.split(',').map(str::trim).collect();
                if names.iter().any(|n| n.is_empty()) {
                    return Err(format!("empty pool name in [{value}]"));
                }
                spec = spec.with_pools(names);
            }
            _ => return Err(format!("unknown clause [{key}], expected [limit] or [pool]")),
        }
    }

    Ok(spec)
}

/// Parses everything after the `pool` keyword.
fn parse_pool(rest: &str) -> Result<Pool, String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let [name, capacity] = tokens.as_slice() else {
        return Err("expected [pool <name> <capacity>]".to_string());
    };

    let capacity: u32 = capacity
        .parse()
        .map_err(|_| format!("pool capacity [{capacity}] must be a whole number"))?;

    Ok(Pool::new(*name, capacity))
}
