//! Discount resolution: own sources plus everything inherited through the chain.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, instrument};

use erplink_core::{ArticleNo, CustomerNo};
use erplink_parties::{ChainNavigator, Customer};

use crate::agreement::DiscountSet;
use crate::cache::{DiscountCache, DiscountCacheKey, NoCache};
use crate::clock::{Clock, SystemClock};
use crate::error::PricingError;
use crate::repository::PricingRepository;
use crate::selector::PriceSelector;
use crate::sources::{DiscountQuery, DiscountSources};

/// Maximum number of chain hops followed before giving up.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 10;

/// Resolves the discount agreements applicable to a customer.
///
/// ## Chain merge
///
/// A customer's own agreements are unioned with those of its chain head, the
/// head's head, and so on. The union is a set over the full agreement identity:
/// an agreement reachable along several paths is counted once.
///
/// ## Termination
///
/// Raw chain data may contain cycles. The walk keeps a visited set and stops at
/// `max_chain_depth` hops; either violation is [`PricingError::CycleDetected`].
///
/// ## Caching
///
/// Only top-level calls go through the cache, keyed on the customer's
/// modification version. Results are identical with or without a cache.
pub struct DiscountResolver<R, C = NoCache> {
    repository: R,
    cache: C,
    clock: Arc<dyn Clock>,
    max_chain_depth: usize,
}

impl<R> DiscountResolver<R, NoCache>
where
    R: PricingRepository,
{
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            cache: NoCache,
            clock: Arc::new(SystemClock),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

impl<R, C> DiscountResolver<R, C>
where
    R: PricingRepository,
    C: DiscountCache,
{
    pub fn with_cache<C2: DiscountCache>(self, cache: C2) -> DiscountResolver<R, C2> {
        DiscountResolver {
            repository: self.repository,
            cache,
            clock: self.clock,
            max_chain_depth: self.max_chain_depth,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_max_chain_depth(mut self, max_chain_depth: usize) -> Self {
        self.max_chain_depth = max_chain_depth;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    /// Date used by undated lookups.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Every agreement applicable to `customer` for `article_no` at `at_date`.
    #[instrument(
        skip(self, customer),
        fields(customer_no = %customer.customer_no, article_no = %article_no, at_date = %at_date)
    )]
    pub fn discounts_for(
        &self,
        customer: &Customer,
        article_no: &ArticleNo,
        at_date: NaiveDate,
    ) -> Result<DiscountSet, PricingError> {
        let key = DiscountCacheKey::new(customer, article_no.clone(), at_date);
        self.cache
            .fetch(&key, || self.resolve(customer, article_no, at_date))
    }

    /// The customer followed by each chain head in turn.
    pub fn chain_lineage(&self, customer: &Customer) -> Result<Vec<Customer>, PricingError> {
        let navigator = ChainNavigator::new(&self.repository);
        let mut visited: HashSet<CustomerNo> = HashSet::from([customer.customer_no]);
        let mut lineage = vec![customer.clone()];

        while let Some(head) = navigator.chain_head(&lineage[lineage.len() - 1])? {
            let depth = lineage.len();
            if depth > self.max_chain_depth || !visited.insert(head.customer_no) {
                return Err(PricingError::CycleDetected {
                    customer_no: head.customer_no,
                    depth,
                });
            }
            debug!(
                customer_no = %customer.customer_no,
                chain_head = %head.customer_no,
                depth,
                "following chain"
            );
            lineage.push(head);
        }

        Ok(lineage)
    }

    fn resolve(
        &self,
        customer: &Customer,
        article_no: &ArticleNo,
        at_date: NaiveDate,
    ) -> Result<DiscountSet, PricingError> {
        // A missing article still matches agreements keyed on its number.
        let article_group = self
            .repository
            .find_article(article_no)?
            .and_then(|a| a.article_group);

        let mut merged = DiscountSet::new();
        for member in self.chain_lineage(customer)? {
            let query = DiscountQuery::new(
                DiscountSources::for_customer(&member),
                article_no.clone(),
                article_group,
                at_date,
            );
            let found = self.repository.find_discount_agreements(&query)?;
            debug!(customer_no = %member.customer_no, found = found.len(), "direct discounts");
            merged.extend(found);
        }

        Ok(merged)
    }

    /// Price selection for a customer already in hand.
    pub fn selector(&self, customer: Customer) -> PriceSelector<'_, R, C> {
        PriceSelector::new(self, customer)
    }

    /// Price selection for a customer looked up by number.
    pub fn selector_for(&self, customer_no: CustomerNo) -> Result<PriceSelector<'_, R, C>, PricingError> {
        let customer = self
            .repository
            .find_customer(customer_no)?
            .ok_or_else(|| PricingError::not_found("customer", customer_no))?;
        Ok(self.selector(customer))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use erplink_core::{ArticleGroupNo, DiscountGroupNo, PriceListNo};
    use erplink_parties::ChainType;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::agreement::{DiscountAgreement, DiscountSource, DiscountTarget, DiscountTerms};
    use crate::fixtures::{FixtureStore, article, customer, date};

    fn a1() -> DiscountTarget {
        DiscountTarget::Article("A1".into())
    }

    fn price_list(no: i64) -> DiscountSource {
        DiscountSource::PriceList(PriceListNo::new(no))
    }

    fn own(no: i64) -> DiscountSource {
        DiscountSource::Customer(CustomerNo::new(no))
    }

    fn group(no: i64) -> DiscountSource {
        DiscountSource::DiscountGroup(DiscountGroupNo::new(no))
    }

    fn at() -> NaiveDate {
        date(2024, 6, 1)
    }

    #[test]
    fn unaffiliated_customer_gets_only_its_own_sources() {
        let store = FixtureStore::default()
            .with_article(article("A1", 100))
            .with_customer(customer(1).with_price_list(PriceListNo::new(5)))
            .with_agreement(own(1), a1(), DiscountTerms::FixedPrice(95))
            .with_agreement(price_list(5), a1(), DiscountTerms::FixedPrice(90))
            .with_agreement(own(2), a1(), DiscountTerms::FixedPrice(10))
            .with_agreement(price_list(6), a1(), DiscountTerms::FixedPrice(20))
            .with_agreement(group(5), a1(), DiscountTerms::FixedPrice(30));
        let resolver = DiscountResolver::new(store);
        let c1 = resolver.repository().customers[&CustomerNo::new(1)].clone();

        let found = resolver.discounts_for(&c1, &"A1".into(), at()).unwrap();
        let sources: Vec<DiscountSource> = found.iter().map(|a| a.source).collect();
        assert_eq!(sources, vec![own(1), price_list(5)]);
    }

    #[test]
    fn member_inherits_chain_head_discounts_without_duplicates() {
        let head = customer(100)
            .with_price_list(PriceListNo::new(5))
            .with_discount_group(DiscountGroupNo::new(7));
        let member = customer(1)
            .with_price_list(PriceListNo::new(5))
            .with_chain(CustomerNo::new(100), ChainType::MemberBilled);
        let store = FixtureStore::default()
            .with_article(article("A1", 100))
            .with_customer(head.clone())
            .with_customer(member.clone())
            .with_agreement(price_list(5), a1(), DiscountTerms::FixedPrice(90))
            .with_agreement(group(7), a1(), DiscountTerms::Percent(dec!(15)))
            .with_agreement(own(1), a1(), DiscountTerms::FixedPrice(97));
        let resolver = DiscountResolver::new(store);

        let member_set = resolver.discounts_for(&member, &"A1".into(), at()).unwrap();
        let head_set = resolver.discounts_for(&head, &"A1".into(), at()).unwrap();

        let direct: DiscountSet = resolver
            .repository()
            .agreements
            .iter()
            .filter(|a| a.source == own(1) || a.source == price_list(5))
            .cloned()
            .collect();
        let expected: DiscountSet = direct.union(&head_set).cloned().collect();

        assert_eq!(member_set, expected);
        assert_eq!(member_set.len(), 3);
        assert_eq!(
            member_set.iter().filter(|a| a.source == price_list(5)).count(),
            1
        );
    }

    #[test]
    fn discounts_are_inherited_regardless_of_chain_type() {
        for chain_type in [ChainType::MemberBilled, ChainType::HeadBilled] {
            let member = customer(1).with_chain(CustomerNo::new(100), chain_type);
            let store = FixtureStore::default()
                .with_customer(customer(100))
                .with_customer(member.clone())
                .with_agreement(own(100), a1(), DiscountTerms::FixedPrice(80));
            let resolver = DiscountResolver::new(store);
            let found = resolver.discounts_for(&member, &"A1".into(), at()).unwrap();
            assert_eq!(found.len(), 1);
        }
    }

    #[test]
    fn self_referencing_or_dangling_chain_stops_recursion() {
        let head = customer(100).with_chain(CustomerNo::new(100), ChainType::HeadBilled);
        let orphan = customer(2).with_chain(CustomerNo::new(404), ChainType::HeadBilled);
        let store = FixtureStore::default()
            .with_customer(head.clone())
            .with_customer(orphan.clone())
            .with_agreement(own(100), a1(), DiscountTerms::FixedPrice(80))
            .with_agreement(own(2), a1(), DiscountTerms::FixedPrice(85));
        let resolver = DiscountResolver::new(store);

        assert_eq!(resolver.chain_lineage(&head).unwrap().len(), 1);
        assert_eq!(resolver.discounts_for(&head, &"A1".into(), at()).unwrap().len(), 1);
        assert_eq!(resolver.chain_lineage(&orphan).unwrap().len(), 1);
        assert_eq!(resolver.discounts_for(&orphan, &"A1".into(), at()).unwrap().len(), 1);
    }

    #[test]
    fn two_customer_cycle_is_detected() {
        let c2 = customer(2).with_chain(CustomerNo::new(3), ChainType::MemberBilled);
        let c3 = customer(3).with_chain(CustomerNo::new(2), ChainType::MemberBilled);
        let store = FixtureStore::default()
            .with_customer(c2.clone())
            .with_customer(c3);
        let resolver = DiscountResolver::new(store);

        match resolver.discounts_for(&c2, &"A1".into(), at()) {
            Err(PricingError::CycleDetected { customer_no, .. }) => {
                assert_eq!(customer_no, CustomerNo::new(2));
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn chain_deeper_than_bound_is_rejected() {
        // 1 -> 2 -> 3 -> 4 -> 5
        let mut store = FixtureStore::default();
        for no in 1..=5 {
            let mut c = customer(no);
            if no < 5 {
                c = c.with_chain(CustomerNo::new(no + 1), ChainType::MemberBilled);
            }
            store = store.with_customer(c);
        }
        let start = store.customers[&CustomerNo::new(1)].clone();

        let shallow = DiscountResolver::new(store).with_max_chain_depth(3);
        assert!(matches!(
            shallow.chain_lineage(&start),
            Err(PricingError::CycleDetected { depth: 4, .. })
        ));

        let deep = shallow.with_max_chain_depth(4);
        assert_eq!(deep.chain_lineage(&start).unwrap().len(), 5);
    }

    #[test]
    fn group_agreements_match_through_article_group() {
        let store = FixtureStore::default()
            .with_article(article("A1", 100).with_group(ArticleGroupNo::new(3)))
            .with_customer(customer(1).with_discount_group(DiscountGroupNo::new(7)))
            .with_agreement(
                group(7),
                DiscountTarget::ArticleGroup(ArticleGroupNo::new(3)),
                DiscountTerms::Percent(dec!(10)),
            )
            .with_agreement(
                group(7),
                DiscountTarget::ArticleGroup(ArticleGroupNo::new(4)),
                DiscountTerms::Percent(dec!(50)),
            );
        let resolver = DiscountResolver::new(store);
        let c1 = resolver.repository().customers[&CustomerNo::new(1)].clone();

        let found = resolver.discounts_for(&c1, &"A1".into(), at()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found.iter().next().unwrap().target,
            DiscountTarget::ArticleGroup(ArticleGroupNo::new(3))
        );
    }

    #[test]
    fn expired_agreements_are_ignored() {
        let store = FixtureStore::default()
            .with_customer(customer(1))
            .with_agreement_window(
                own(1),
                a1(),
                DiscountTerms::FixedPrice(50),
                date(2023, 1, 1),
                Some(date(2023, 12, 31)),
            );
        let resolver = DiscountResolver::new(store);
        let c1 = resolver.repository().customers[&CustomerNo::new(1)].clone();

        assert!(resolver.discounts_for(&c1, &"A1".into(), at()).unwrap().is_empty());
        assert_eq!(
            resolver
                .discounts_for(&c1, &"A1".into(), date(2023, 6, 1))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let store = FixtureStore::default()
            .with_customer(customer(100).with_price_list(PriceListNo::new(1)))
            .with_customer(customer(1).with_chain(CustomerNo::new(100), ChainType::HeadBilled))
            .with_agreement(price_list(1), a1(), DiscountTerms::FixedPrice(70))
            .with_agreement(own(1), a1(), DiscountTerms::FixedPrice(75));
        let resolver = DiscountResolver::new(store);
        let c1 = resolver.repository().customers[&CustomerNo::new(1)].clone();

        let first = resolver.discounts_for(&c1, &"A1".into(), at()).unwrap();
        let second = resolver.discounts_for(&c1, &"A1".into(), at()).unwrap();
        assert_eq!(first, second);
    }

    /// Counts computations per key; a minimal memoizing cache.
    #[derive(Default)]
    struct CountingCache {
        entries: Mutex<HashMap<DiscountCacheKey, DiscountSet>>,
        computations: Mutex<usize>,
    }

    impl DiscountCache for CountingCache {
        fn fetch<F>(&self, key: &DiscountCacheKey, compute: F) -> Result<DiscountSet, PricingError>
        where
            F: FnOnce() -> Result<DiscountSet, PricingError>,
        {
            if let Some(hit) = self.entries.lock().unwrap().get(key) {
                return Ok(hit.clone());
            }
            *self.computations.lock().unwrap() += 1;
            let value = compute()?;
            self.entries.lock().unwrap().insert(key.clone(), value.clone());
            Ok(value)
        }
    }

    #[test]
    fn cache_is_keyed_on_customer_version() {
        let store = FixtureStore::default()
            .with_customer(customer(1))
            .with_agreement(own(1), a1(), DiscountTerms::FixedPrice(75));
        let resolver = DiscountResolver::new(store).with_cache(CountingCache::default());
        let mut c1 = resolver.repository().customers[&CustomerNo::new(1)].clone();

        let uncached = resolver.discounts_for(&c1, &"A1".into(), at()).unwrap();
        let cached = resolver.discounts_for(&c1, &"A1".into(), at()).unwrap();
        assert_eq!(uncached, cached);
        assert_eq!(*resolver.cache().computations.lock().unwrap(), 1);
        assert_eq!(resolver.repository().queries(), 1);

        c1.last_update += chrono::Duration::seconds(1);
        resolver.discounts_for(&c1, &"A1".into(), at()).unwrap();
        assert_eq!(*resolver.cache().computations.lock().unwrap(), 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_source() -> impl Strategy<Value = DiscountSource> {
            prop_oneof![
                (1i64..=4).prop_map(own),
                (1i64..=3).prop_map(price_list),
                (1i64..=3).prop_map(group),
            ]
        }

        fn arb_agreement() -> impl Strategy<Value = DiscountAgreement> {
            (arb_source(), 1u64..200, prop::bool::ANY).prop_map(|(source, price, on_a1)| {
                let target = if on_a1 { a1() } else { DiscountTarget::Article("B2".into()) };
                DiscountAgreement::new(source, target, date(2000, 1, 1), None, DiscountTerms::FixedPrice(price))
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                .. ProptestConfig::default()
            })]

            /// Member resolution = direct(member) ∪ resolution(head); agreements appear once.
            #[test]
            fn member_set_is_union_of_direct_and_head(
                agreements in prop::collection::vec(arb_agreement(), 0..24),
                member_pl in 1i64..=3,
                head_pl in 1i64..=3,
                head_group in 1i64..=3,
            ) {
                let head = customer(4)
                    .with_price_list(PriceListNo::new(head_pl))
                    .with_discount_group(DiscountGroupNo::new(head_group));
                let member = customer(1)
                    .with_price_list(PriceListNo::new(member_pl))
                    .with_chain(CustomerNo::new(4), ChainType::MemberBilled);

                let mut store = FixtureStore::default()
                    .with_customer(head.clone())
                    .with_customer(member.clone());
                store.agreements = agreements;
                let resolver = DiscountResolver::new(store);

                let member_sources = DiscountSources::for_customer(&member);
                let direct: DiscountSet = resolver
                    .repository()
                    .agreements
                    .iter()
                    .filter(|a| member_sources.contains(&a.source) && a.target == a1())
                    .cloned()
                    .collect();
                let head_set = resolver.discounts_for(&head, &"A1".into(), at()).unwrap();
                let member_set = resolver.discounts_for(&member, &"A1".into(), at()).unwrap();

                let expected: DiscountSet = direct.union(&head_set).cloned().collect();
                prop_assert_eq!(&member_set, &expected);
                prop_assert!(member_set.iter().all(|a| a.target == a1()));
            }

            /// Without a chain only the customer's own sources contribute.
            #[test]
            fn unaffiliated_customer_ignores_foreign_sources(
                agreements in prop::collection::vec(arb_agreement(), 0..24),
                pl in 1i64..=3,
            ) {
                let c = customer(1).with_price_list(PriceListNo::new(pl));
                let mut store = FixtureStore::default().with_customer(c.clone());
                store.agreements = agreements;
                let resolver = DiscountResolver::new(store);

                let found = resolver.discounts_for(&c, &"A1".into(), at()).unwrap();
                let allowed = [own(1), price_list(pl)];
                prop_assert!(found.iter().all(|a| allowed.contains(&a.source)));
                let expected = resolver
                    .repository()
                    .agreements
                    .iter()
                    .filter(|a| allowed.contains(&a.source) && a.target == a1())
                    .cloned()
                    .collect::<DiscountSet>();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
