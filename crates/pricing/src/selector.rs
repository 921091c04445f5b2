//! Price selection: rank candidate prices for one customer and explain the winner.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};

use erplink_core::ArticleNo;
use erplink_parties::Customer;
use erplink_products::Article;

use crate::agreement::{DiscountAgreement, DiscountSource, DiscountSourceKind};
use crate::cache::DiscountCache;
use crate::error::PricingError;
use crate::holder::DiscountHolder;
use crate::reason::PriceReason;
use crate::repository::PricingRepository;
use crate::resolver::DiscountResolver;
use crate::sources::DiscountSources;

/// What a candidate price came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PriceRecord {
    /// The article's own base price.
    Article(Article),
    /// A discount agreement and the net price it yields.
    Discount { agreement: DiscountAgreement, price: u64 },
}

impl PriceRecord {
    pub fn price(&self) -> u64 {
        match self {
            PriceRecord::Article(article) => article.base_price,
            PriceRecord::Discount { price, .. } => *price,
        }
    }

    pub fn agreement(&self) -> Option<&DiscountAgreement> {
        match self {
            PriceRecord::Article(_) => None,
            PriceRecord::Discount { agreement, .. } => Some(agreement),
        }
    }
}

/// Candidate prices keyed by reason, cheapest first.
///
/// Each reason appears once with its lowest price. The `article` entry is always
/// present; on a tie it sorts ahead of discounts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Prices(Vec<(PriceReason, PriceRecord)>);

impl Prices {
    fn rank(mut entries: Vec<(PriceReason, PriceRecord)>) -> Self {
        entries.sort_by_key(|(_, record)| record.price());
        let mut ranked: Vec<(PriceReason, PriceRecord)> = Vec::with_capacity(entries.len());
        for (reason, record) in entries {
            if !ranked.iter().any(|(seen, _)| *seen == reason) {
                ranked.push((reason, record));
            }
        }
        Self(ranked)
    }

    /// Cheapest entry.
    pub fn first(&self) -> Option<(&PriceReason, &PriceRecord)> {
        self.0.first().map(|(reason, record)| (reason, record))
    }

    pub fn get(&self, reason: &PriceReason) -> Option<&PriceRecord> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == reason)
            .map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PriceReason, &PriceRecord)> {
        self.0.iter().map(|(reason, record)| (reason, record))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Price operations bound to one customer.
pub struct PriceSelector<'r, R, C> {
    resolver: &'r DiscountResolver<R, C>,
    customer: Customer,
    own_sources: DiscountSources,
}

impl<'r, R, C> PriceSelector<'r, R, C>
where
    R: PricingRepository,
    C: DiscountCache,
{
    pub(crate) fn new(resolver: &'r DiscountResolver<R, C>, customer: Customer) -> Self {
        let own_sources = DiscountSources::for_customer(&customer);
        Self {
            resolver,
            customer,
            own_sources,
        }
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    fn article(&self, article_no: &ArticleNo) -> Result<Article, PricingError> {
        self.resolver
            .repository()
            .find_article(article_no)?
            .ok_or_else(|| PricingError::not_found("article", article_no))
    }

    /// Base price plus every discount applicable at `at_date`.
    pub fn all_prices_for(&self, article_no: &ArticleNo, at_date: NaiveDate) -> Result<Prices, PricingError> {
        let article = self.article(article_no)?;
        let discounts = self
            .resolver
            .discounts_for(&self.customer, article_no, at_date)?;

        let mut entries = Vec::with_capacity(discounts.len() + 1);
        entries.push((PriceReason::Article, PriceRecord::Article(article.clone())));
        for agreement in discounts {
            let reason = PriceReason::for_agreement(&agreement, &self.own_sources);
            let price = agreement.price_for(article.base_price);
            entries.push((reason, PriceRecord::Discount { agreement, price }));
        }
        Ok(Prices::rank(entries))
    }

    /// Candidate prices as of today.
    pub fn prices_for(&self, article_no: &ArticleNo) -> Result<Prices, PricingError> {
        self.all_prices_for(article_no, self.resolver.today())
    }

    /// Effective price.
    ///
    /// Undated: the lowest of [`prices_for`](Self::prices_for), falling back to the
    /// base price. Dated: the lowest discount valid at that date, or `None`.
    #[instrument(
        skip(self),
        fields(customer_no = %self.customer.customer_no, article_no = %article_no)
    )]
    pub fn price_for(&self, article_no: &ArticleNo, at_date: Option<NaiveDate>) -> Result<Option<u64>, PricingError> {
        match at_date {
            None => Ok(self.prices_for(article_no)?.first().map(|(_, record)| record.price())),
            Some(at_date) => {
                let article = self.article(article_no)?;
                let lowest = self
                    .resolver
                    .discounts_for(&self.customer, article_no, at_date)?
                    .iter()
                    .map(|agreement| agreement.price_for(article.base_price))
                    .min();
                if lowest.is_none() {
                    debug!(%at_date, "no discount valid at date");
                }
                Ok(lowest)
            }
        }
    }

    /// Today's effective price and the reason that produced it.
    pub fn explained_price_for(&self, article_no: &ArticleNo) -> Result<(PriceReason, u64), PricingError> {
        let prices = self.prices_for(article_no)?;
        prices
            .first()
            .map(|(reason, record)| (*reason, record.price()))
            .ok_or_else(|| PricingError::not_found("price", article_no))
    }

    /// Discount factor of the source behind today's winning price.
    pub fn discount_factor(&self, article_no: &ArticleNo) -> Result<Decimal, PricingError> {
        let prices = self.prices_for(article_no)?;
        let Some((reason, record)) = prices.first() else {
            return Err(PricingError::not_found("price", article_no));
        };
        match record.agreement() {
            None => Ok(Decimal::ZERO),
            Some(agreement) => self.factor_of(*reason, agreement.source, article_no),
        }
    }

    /// Discount factor of the entity a reason label points at.
    ///
    /// The entity is the source of today's candidate for that reason. Without a
    /// candidate, `Own` labels point at the customer's own source of the kind and
    /// `ChainNo:` labels at the nearest chain ancestor carrying one.
    pub fn discount_factor_for_reason(&self, article_no: &ArticleNo, reason: &str) -> Result<Decimal, PricingError> {
        let reason: PriceReason = reason.parse()?;
        if reason.is_article() {
            return Ok(Decimal::ZERO);
        }
        let prices = self.prices_for(article_no)?;
        let source = match prices.get(&reason).and_then(PriceRecord::agreement) {
            Some(agreement) => agreement.source,
            None => self.source_for(reason)?,
        };
        self.factor_of(reason, source, article_no)
    }

    fn factor_of(
        &self,
        reason: PriceReason,
        source: DiscountSource,
        article_no: &ArticleNo,
    ) -> Result<Decimal, PricingError> {
        let holder = self.holder(reason, source)?;
        let article = self.article(article_no)?;
        Ok(holder.discount_factor(self.resolver.repository(), &article, self.resolver.today())?)
    }

    fn source_for(&self, reason: PriceReason) -> Result<DiscountSource, PricingError> {
        let (kind, found) = match reason {
            PriceReason::Article => {
                return Err(PricingError::malformed_reason(
                    reason.to_string(),
                    "article has no discount source",
                ));
            }
            PriceReason::Own(kind) => (kind, self.own_sources.of_kind(kind)),
            PriceReason::Chain(kind) => {
                let lineage = self.resolver.chain_lineage(&self.customer)?;
                if lineage.len() < 2 {
                    return Err(PricingError::malformed_reason(
                        reason.to_string(),
                        "customer has no chain head",
                    ));
                }
                let found = lineage[1..]
                    .iter()
                    .find_map(|ancestor| DiscountSources::for_customer(ancestor).of_kind(kind));
                (kind, found)
            }
        };

        found.ok_or_else(|| {
            PricingError::malformed_reason(
                reason.to_string(),
                format!("customer {} has no {} in reach", self.customer.customer_no, kind),
            )
        })
    }

    fn holder(&self, reason: PriceReason, source: DiscountSource) -> Result<DiscountHolder, PricingError> {
        let repository = self.resolver.repository();
        let holder = match source {
            DiscountSource::Customer(no) => repository.find_customer(no)?.map(DiscountHolder::Customer),
            DiscountSource::PriceList(no) => repository.find_price_list(no)?.map(DiscountHolder::PriceList),
            DiscountSource::DiscountGroup(no) => repository
                .find_discount_group(no)?
                .map(DiscountHolder::DiscountGroup),
        };

        holder.ok_or_else(|| {
            let missing = match source.kind() {
                DiscountSourceKind::Customer => "customer",
                DiscountSourceKind::PriceList => "price list",
                DiscountSourceKind::DiscountGroup => "discount group",
            };
            PricingError::malformed_reason(
                reason.to_string(),
                format!("{missing} {} does not exist", source.raw_id()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use erplink_core::{CustomerNo, DiscountGroupNo, PriceListNo};
    use erplink_parties::ChainType;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::agreement::{DiscountTarget, DiscountTerms};
    use crate::clock::FixedClock;
    use crate::fixtures::{FixtureStore, article, customer, date};

    fn a1() -> ArticleNo {
        ArticleNo::new("A1")
    }

    fn target() -> DiscountTarget {
        DiscountTarget::Article(a1())
    }

    /// C1 on price list 5, which prices A1 at 90 during 2024; base price 100.
    fn c1_store() -> FixtureStore {
        FixtureStore::default()
            .with_article(article("A1", 100))
            .with_customer(customer(1).with_price_list(PriceListNo::new(5)))
            .with_price_list(5, "Retail")
            .with_agreement_window(
                DiscountSource::PriceList(PriceListNo::new(5)),
                target(),
                DiscountTerms::FixedPrice(90),
                date(2024, 1, 1),
                Some(date(2024, 12, 31)),
            )
    }

    #[test]
    fn dated_price_inside_and_outside_the_window() {
        let resolver = DiscountResolver::new(c1_store()).with_clock(FixedClock(date(2025, 6, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        assert_eq!(selector.price_for(&a1(), Some(date(2024, 6, 1))).unwrap(), Some(90));
        assert_eq!(selector.price_for(&a1(), Some(date(2025, 6, 1))).unwrap(), None);
        assert_eq!(selector.price_for(&a1(), None).unwrap(), Some(100));
    }

    #[test]
    fn undated_price_uses_today() {
        let resolver = DiscountResolver::new(c1_store()).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        assert_eq!(selector.price_for(&a1(), None).unwrap(), Some(90));
        let (reason, price) = selector.explained_price_for(&a1()).unwrap();
        assert_eq!(reason.to_string(), "PriceListNo");
        assert_eq!(price, 90);
    }

    #[test]
    fn prices_always_include_the_article_and_are_sorted() {
        let store = c1_store()
            .with_agreement(
                DiscountSource::Customer(CustomerNo::new(1)),
                target(),
                DiscountTerms::FixedPrice(120),
            )
            .with_agreement(
                DiscountSource::Customer(CustomerNo::new(1)),
                target(),
                DiscountTerms::FixedPrice(95),
            );
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        let prices = selector.prices_for(&a1()).unwrap();
        let listed: Vec<(String, u64)> = prices
            .iter()
            .map(|(reason, record)| (reason.to_string(), record.price()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("PriceListNo".to_string(), 90),
                ("CustomerNo".to_string(), 95),
                ("article".to_string(), 100),
            ]
        );
        assert_eq!(prices.get(&PriceReason::Article).unwrap().price(), 100);
    }

    #[test]
    fn article_wins_ties_and_has_no_factor() {
        let store = FixtureStore::default()
            .with_article(article("A1", 100))
            .with_customer(customer(1))
            .with_agreement(
                DiscountSource::Customer(CustomerNo::new(1)),
                target(),
                DiscountTerms::FixedPrice(100),
            );
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        let (reason, price) = selector.explained_price_for(&a1()).unwrap();
        assert!(reason.is_article());
        assert_eq!(price, 100);
        assert_eq!(selector.discount_factor(&a1()).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn inherited_prices_are_labelled_with_the_chain() {
        let head = customer(100).with_discount_group(DiscountGroupNo::new(7));
        let member = customer(1)
            .with_price_list(PriceListNo::new(5))
            .with_chain(CustomerNo::new(100), ChainType::MemberBilled);
        let store = FixtureStore::default()
            .with_article(article("A1", 200))
            .with_customer(head)
            .with_customer(member)
            .with_discount_group(7, "Wholesale")
            .with_agreement(
                DiscountSource::DiscountGroup(DiscountGroupNo::new(7)),
                target(),
                DiscountTerms::Percent(dec!(25)),
            )
            .with_agreement(
                DiscountSource::PriceList(PriceListNo::new(5)),
                target(),
                DiscountTerms::FixedPrice(180),
            );
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        let (reason, price) = selector.explained_price_for(&a1()).unwrap();
        assert_eq!(reason.to_string(), "ChainNo:DiscountGrpCustNo");
        assert_eq!(price, 150);
        assert_eq!(selector.discount_factor(&a1()).unwrap(), dec!(0.25));
    }

    /// Member 1 whose head 100 is itself in chain 200; A1 costs 100.
    fn two_level_chain() -> FixtureStore {
        FixtureStore::default()
            .with_article(article("A1", 100))
            .with_customer(customer(1).with_chain(CustomerNo::new(100), ChainType::MemberBilled))
    }

    #[test]
    fn factor_comes_from_a_grand_head_source_the_head_lacks() {
        let store = two_level_chain()
            .with_customer(customer(100).with_chain(CustomerNo::new(200), ChainType::HeadBilled))
            .with_customer(customer(200).with_discount_group(DiscountGroupNo::new(7)))
            .with_discount_group(7, "Wholesale")
            .with_agreement(
                DiscountSource::DiscountGroup(DiscountGroupNo::new(7)),
                target(),
                DiscountTerms::Percent(dec!(25)),
            );
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        let (reason, price) = selector.explained_price_for(&a1()).unwrap();
        assert_eq!(reason.to_string(), "ChainNo:DiscountGrpCustNo");
        assert_eq!(price, 75);
        assert_eq!(selector.discount_factor(&a1()).unwrap(), dec!(0.25));
        assert_eq!(
            selector
                .discount_factor_for_reason(&a1(), "ChainNo:DiscountGrpCustNo")
                .unwrap(),
            dec!(0.25)
        );
    }

    #[test]
    fn factor_follows_the_winning_price_list_not_the_nearest_one() {
        let store = two_level_chain()
            .with_customer(
                customer(100)
                    .with_price_list(PriceListNo::new(6))
                    .with_chain(CustomerNo::new(200), ChainType::HeadBilled),
            )
            .with_customer(customer(200).with_price_list(PriceListNo::new(8)))
            .with_price_list(6, "Regional")
            .with_price_list(8, "National")
            .with_agreement(
                DiscountSource::PriceList(PriceListNo::new(8)),
                target(),
                DiscountTerms::FixedPrice(80),
            );
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        let (reason, price) = selector.explained_price_for(&a1()).unwrap();
        assert_eq!(reason.to_string(), "ChainNo:PriceListNo");
        assert_eq!(price, 80);
        assert_eq!(selector.discount_factor(&a1()).unwrap(), dec!(0.2));
        assert_eq!(
            selector.discount_factor_for_reason(&a1(), "ChainNo:PriceListNo").unwrap(),
            dec!(0.2)
        );
    }

    #[test]
    fn chain_levels_sharing_a_kind_keep_the_cheaper_entry() {
        let store = two_level_chain()
            .with_customer(
                customer(100)
                    .with_price_list(PriceListNo::new(6))
                    .with_chain(CustomerNo::new(200), ChainType::HeadBilled),
            )
            .with_customer(customer(200).with_price_list(PriceListNo::new(8)))
            .with_price_list(6, "Regional")
            .with_price_list(8, "National")
            .with_agreement(
                DiscountSource::PriceList(PriceListNo::new(6)),
                target(),
                DiscountTerms::FixedPrice(85),
            )
            .with_agreement(
                DiscountSource::PriceList(PriceListNo::new(8)),
                target(),
                DiscountTerms::FixedPrice(80),
            );
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        let prices = selector.prices_for(&a1()).unwrap();
        assert_eq!(prices.len(), 2);
        let chained = prices
            .get(&PriceReason::Chain(DiscountSourceKind::PriceList))
            .unwrap();
        assert_eq!(chained.price(), 80);
        assert_eq!(
            chained.agreement().unwrap().source,
            DiscountSource::PriceList(PriceListNo::new(8))
        );
        assert_eq!(selector.discount_factor(&a1()).unwrap(), dec!(0.2));
    }

    #[test]
    fn chain_reason_without_candidate_uses_nearest_ancestor_of_that_kind() {
        let store = two_level_chain()
            .with_customer(customer(100).with_chain(CustomerNo::new(200), ChainType::HeadBilled))
            .with_customer(customer(200).with_price_list(PriceListNo::new(8)))
            .with_price_list(8, "National");
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        assert_eq!(
            selector.discount_factor_for_reason(&a1(), "ChainNo:PriceListNo").unwrap(),
            Decimal::ZERO
        );
        assert!(matches!(
            selector.discount_factor_for_reason(&a1(), "ChainNo:DiscountGrpCustNo"),
            Err(PricingError::MalformedReason { .. })
        ));
    }

    #[test]
    fn fixed_price_factor_is_relative_to_base() {
        let store = c1_store();
        let resolver = DiscountResolver::new(store).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        assert_eq!(selector.discount_factor(&a1()).unwrap(), dec!(0.1));
        assert_eq!(
            selector.discount_factor_for_reason(&a1(), "article").unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn malformed_reasons_are_rejected() {
        let resolver = DiscountResolver::new(c1_store()).with_clock(FixedClock(date(2024, 3, 1)));
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        for reason in ["Bogus", "ChainNo:PriceListNo", "DiscountGrpCustNo", "x:y:z"] {
            assert!(
                matches!(
                    selector.discount_factor_for_reason(&a1(), reason),
                    Err(PricingError::MalformedReason { .. })
                ),
                "{reason} should be malformed"
            );
        }
    }

    #[test]
    fn missing_price_list_row_is_a_malformed_reason() {
        let store = FixtureStore::default()
            .with_article(article("A1", 100))
            .with_customer(customer(1).with_price_list(PriceListNo::new(9)));
        let resolver = DiscountResolver::new(store);
        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();

        assert!(matches!(
            selector.discount_factor_for_reason(&a1(), "PriceListNo"),
            Err(PricingError::MalformedReason { .. })
        ));
    }

    #[test]
    fn missing_article_and_customer_are_not_found() {
        let resolver = DiscountResolver::new(c1_store());
        assert!(matches!(
            resolver.selector_for(CustomerNo::new(99)),
            Err(PricingError::NotFound { entity: "customer", .. })
        ));

        let selector = resolver.selector_for(CustomerNo::new(1)).unwrap();
        let missing = ArticleNo::new("NOPE");
        assert!(matches!(
            selector.price_for(&missing, None),
            Err(PricingError::NotFound { entity: "article", .. })
        ));
        assert!(matches!(
            selector.price_for(&missing, Some(date(2024, 6, 1))),
            Err(PricingError::NotFound { entity: "article", .. })
        ));
    }
}
