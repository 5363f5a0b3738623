//! Planning agent
//!
//! Runs the evaluation workflow for one job: scan for a shortlist, price each
//! deal with every predictor, combine estimates, and keep the deals whose
//! discount clears the threshold. Individual predictor failures are recovered
//! here; only scanner failure aborts a run.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use crate::bus::LogBroadcaster;
use crate::error::DealError;
use crate::types::{Deal, Opportunity};

use super::ensemble::EnsembleAgent;
use super::predictor::Predictor;
use super::scanner::DealScanner;

pub struct PlanningAgent {
    scanner: Arc<dyn DealScanner>,
    predictors: Vec<Arc<dyn Predictor>>,
    ensemble: EnsembleAgent,
    threshold: f64,
    bus: Arc<LogBroadcaster>,
}

impl PlanningAgent {
    pub fn new(
        scanner: Arc<dyn DealScanner>,
        predictors: Vec<Arc<dyn Predictor>>,
        ensemble: EnsembleAgent,
        threshold: f64,
        bus: Arc<LogBroadcaster>,
    ) -> Self {
        Self { scanner, predictors, ensemble, threshold, bus }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run the full workflow for one set of categories. Returns accepted
    /// opportunities sorted by discount, best first.
    pub async fn plan(
        &self,
        categories: &[String],
        seen: HashSet<String>,
    ) -> Result<Vec<Opportunity>, DealError> {
        self.bus.info(format!(
            "Planning agent is kicking off a run for categories: {}",
            categories.join(", ")
        ));

        let shortlist = self.scanner.scan(categories, &seen).await?;
        self.bus.info(format!("{} deals shortlisted for pricing", shortlist.len()));

        if shortlist.is_empty() {
            self.bus.info("Nothing new to evaluate in this run");
            return Ok(Vec::new());
        }

        // Deals are independent; price them concurrently
        let evaluated = join_all(shortlist.iter().map(|deal| self.evaluate(deal))).await;
        let mut opportunities: Vec<Opportunity> = evaluated.into_iter().flatten().collect();

        opportunities
            .sort_by(|a, b| b.discount.partial_cmp(&a.discount).unwrap_or(Ordering::Equal));

        self.bus.info(format!(
            "Planning agent accepted {} of {} shortlisted deals",
            opportunities.len(),
            shortlist.len()
        ));
        Ok(opportunities)
    }

    /// Price one deal with every predictor and apply the discount filter.
    /// Returns None when the deal is dropped (no estimates, or below
    /// threshold) — never an error.
    async fn evaluate(&self, deal: &Deal) -> Option<Opportunity> {
        let label = truncate(&deal.product_description, 60);

        let outcomes = join_all(self.predictors.iter().map(|predictor| {
            let description = deal.product_description.clone();
            async move { (predictor.name().to_string(), predictor.estimate(&description).await) }
        }))
        .await;

        let mut estimates = Vec::with_capacity(outcomes.len());
        for (name, outcome) in outcomes {
            match outcome {
                Ok(price) => {
                    self.bus.info(format!("{name} estimates ${price:.2} for \"{label}\""));
                    estimates.push(price);
                }
                Err(err) => {
                    self.bus.warning(format!("{name} failed for \"{label}\": {err}"));
                }
            }
        }

        let estimate = match self.ensemble.price(&estimates) {
            Ok(estimate) => estimate,
            Err(DealError::EnsembleFailure) => {
                self.bus
                    .warning(format!("No predictor produced an estimate for \"{label}\", dropping"));
                return None;
            }
            Err(err) => {
                self.bus.warning(format!("Ensemble failed for \"{label}\": {err}"));
                return None;
            }
        };

        if estimate <= 0.0 {
            self.bus.warning(format!("Ensemble estimate for \"{label}\" is not positive, dropping"));
            return None;
        }

        let discount = (estimate - deal.price) / estimate;
        self.bus.info(format!(
            "Ensemble estimates ${estimate:.2} for \"{label}\" listed at ${:.2} ({:.1}% discount)",
            deal.price,
            discount * 100.0
        ));

        if discount >= self.threshold {
            Some(Opportunity { deal: deal.clone(), estimate, discount })
        } else {
            self.bus.info(format!(
                "\"{label}\" below the {:.0}% discount threshold, skipping",
                self.threshold * 100.0
            ));
            None
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(max_chars).collect();
        format!("{prefix}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ensemble::EnsembleWeights;
    use async_trait::async_trait;

    struct FixedScanner(Vec<Deal>);

    #[async_trait]
    impl DealScanner for FixedScanner {
        async fn scan(
            &self,
            _categories: &[String],
            _seen: &HashSet<String>,
        ) -> Result<Vec<Deal>, DealError> {
            Ok(self.0.clone())
        }
    }

    struct FixedPredictor {
        name: &'static str,
        price: Result<f64, ()>,
    }

    #[async_trait]
    impl Predictor for FixedPredictor {
        fn name(&self) -> &str {
            self.name
        }

        async fn estimate(&self, _description: &str) -> Result<f64, DealError> {
            self.price
                .map_err(|_| DealError::PredictionFailure(format!("{} is down", self.name)))
        }
    }

    fn laptop() -> Deal {
        Deal {
            product_description: "Used laptop, barely worn".into(),
            price: 200.0,
            url: "https://example.com/laptop".into(),
        }
    }

    fn planner(predictors: Vec<Arc<dyn Predictor>>, threshold: f64) -> PlanningAgent {
        PlanningAgent::new(
            Arc::new(FixedScanner(vec![laptop()])),
            predictors,
            EnsembleAgent::new(EnsembleWeights::default()),
            threshold,
            Arc::new(LogBroadcaster::new()),
        )
    }

    fn three_predictors() -> Vec<Arc<dyn Predictor>> {
        vec![
            Arc::new(FixedPredictor { name: "Specialist", price: Ok(250.0) }),
            Arc::new(FixedPredictor { name: "Frontier", price: Ok(260.0) }),
            Arc::new(FixedPredictor { name: "Boost", price: Ok(255.0) }),
        ]
    }

    #[tokio::test]
    async fn accepts_deal_above_threshold() {
        let planner = planner(three_predictors(), 0.2);
        let opportunities = planner.plan(&["Electronics".into()], HashSet::new()).await.unwrap();

        assert_eq!(opportunities.len(), 1);
        let opp = &opportunities[0];
        assert!((opp.estimate - 255.0).abs() < 1e-9);
        assert!((opp.discount - (255.0 - 200.0) / 255.0).abs() < 1e-9);
        assert!(opp.discount >= 0.2);
    }

    #[tokio::test]
    async fn one_failed_predictor_is_recovered() {
        let predictors: Vec<Arc<dyn Predictor>> = vec![
            Arc::new(FixedPredictor { name: "Specialist", price: Ok(250.0) }),
            Arc::new(FixedPredictor { name: "Frontier", price: Err(()) }),
            Arc::new(FixedPredictor { name: "Boost", price: Ok(260.0) }),
        ];
        let planner = planner(predictors, 0.2);
        let opportunities = planner.plan(&["Electronics".into()], HashSet::new()).await.unwrap();

        // Mean of the two survivors
        assert_eq!(opportunities.len(), 1);
        assert!((opportunities[0].estimate - 255.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn all_predictors_failing_drops_the_deal() {
        let predictors: Vec<Arc<dyn Predictor>> = vec![
            Arc::new(FixedPredictor { name: "Specialist", price: Err(()) }),
            Arc::new(FixedPredictor { name: "Frontier", price: Err(()) }),
        ];
        let planner = planner(predictors, 0.2);
        let opportunities = planner.plan(&["Electronics".into()], HashSet::new()).await.unwrap();
        assert!(opportunities.is_empty());
    }

    #[tokio::test]
    async fn below_threshold_deal_is_skipped() {
        // Estimate 210 on a 200 listing: 4.8% discount
        let predictors: Vec<Arc<dyn Predictor>> =
            vec![Arc::new(FixedPredictor { name: "Specialist", price: Ok(210.0) })];
        let planner = planner(predictors, 0.2);
        let opportunities = planner.plan(&["Electronics".into()], HashSet::new()).await.unwrap();
        assert!(opportunities.is_empty());
    }

    #[tokio::test]
    async fn results_sorted_by_discount_descending() {
        let deals = vec![
            Deal { product_description: "small discount".into(), price: 180.0, url: "https://x.com/a".into() },
            Deal { product_description: "big discount".into(), price: 100.0, url: "https://x.com/b".into() },
        ];
        let planner = PlanningAgent::new(
            Arc::new(FixedScanner(deals)),
            vec![Arc::new(FixedPredictor { name: "Specialist", price: Ok(250.0) })],
            EnsembleAgent::new(EnsembleWeights::default()),
            0.2,
            Arc::new(LogBroadcaster::new()),
        );
        let opportunities = planner.plan(&["Electronics".into()], HashSet::new()).await.unwrap();
        assert_eq!(opportunities.len(), 2);
        assert_eq!(opportunities[0].deal.product_description, "big discount");
        assert!(opportunities[0].discount > opportunities[1].discount);
    }
}
