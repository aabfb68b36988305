//! Single-shot orders: market, limit, and exchange-held stop-limit.
//!
//! No multi-step structure - validate, submit through the shared retry path,
//! report. The stop-limit variant here is held by the exchange; the
//! client-side polling variant lives in `stop_limit.rs`.

use super::core::Executor;
use super::results::{ExecError, OrderReport};
use crate::clock::Clock;
use crate::config::OrderConfig;
use crate::events::EventPayload;
use crate::gateway::ExchangeGateway;
use crate::order::{OrderSpec, OrderStatus, TimeInForce};
use crate::plan::PlanKind;

impl<G: ExchangeGateway, C: Clock> Executor<G, C> {
    pub fn submit_order(&mut self, cfg: &OrderConfig) -> Result<OrderReport, ExecError> {
        let rules = self.fetch_rules(&cfg.symbol)?;
        let validated = rules.validate(cfg.quantity, cfg.price)?;

        let plan_id = self.next_plan_id();
        self.emit(EventPayload::PlanCreated {
            plan_id,
            kind: PlanKind::Order,
            symbol: cfg.symbol.clone(),
            side: cfg.side,
            total_quantity: validated.quantity,
        });

        let spec = match (validated.price, cfg.stop_price) {
            (Some(limit), Some(stop)) => {
                let stop = rules.align_price(stop)?;
                OrderSpec::stop_limit(cfg.symbol.clone(), cfg.side, validated.quantity, stop, limit)
            }
            (Some(limit), None) => OrderSpec::limit(
                cfg.symbol.clone(),
                cfg.side,
                validated.quantity,
                limit,
                TimeInForce::Gtc,
            ),
            (None, _) => OrderSpec::market(cfg.symbol.clone(), cfg.side, validated.quantity),
        };

        let handle = self.submit_tracked(plan_id, spec)?;
        let view = self.order_view(handle);

        if view.status == OrderStatus::Rejected {
            self.emit(EventPayload::PlanFailed {
                plan_id,
                reason: view
                    .reject_reason
                    .clone()
                    .unwrap_or_else(|| "order rejected".to_string()),
            });
        } else {
            self.emit(EventPayload::PlanCompleted { plan_id });
        }

        Ok(OrderReport {
            plan_id,
            handle,
            status: view.status,
            executed_quantity: view.executed_quantity,
            average_price: view.average_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ExecConfig, OrderConfig};
    use crate::engine::Executor;
    use crate::order::OrderStatus;
    use crate::rules::SymbolRules;
    use crate::sim::{SimControl, SimWorld};
    use crate::types::{Price, Side, Symbol};
    use rust_decimal_macros::dec;

    fn setup(mark: rust_decimal::Decimal) -> (SimControl, Executor<crate::sim::SimGateway, crate::sim::SimClock>) {
        let mut world = SimWorld::new();
        world.list_symbol(Symbol::new("BTCUSDT"), SymbolRules::btc_usdt(), mark);
        let control = SimControl::new(world);
        let (gateway, clock) = control.split();
        (control, Executor::new(gateway, clock, ExecConfig::default()))
    }

    #[test]
    fn market_order_fills_immediately() {
        let (_control, mut exec) = setup(dec!(50000));
        let report = exec
            .submit_order(&OrderConfig {
                symbol: Symbol::new("BTCUSDT"),
                side: Side::Buy,
                quantity: dec!(0.01),
                price: None,
                stop_price: None,
            })
            .unwrap();

        assert_eq!(report.status, OrderStatus::Filled);
        assert_eq!(report.executed_quantity, dec!(0.01));
        assert_eq!(report.average_price.unwrap().value(), dec!(50000));
    }

    #[test]
    fn limit_order_rests_until_crossed() {
        let (control, mut exec) = setup(dec!(50000));
        let report = exec
            .submit_order(&OrderConfig {
                symbol: Symbol::new("BTCUSDT"),
                side: Side::Buy,
                quantity: dec!(0.01),
                price: Some(Price::new_unchecked(dec!(49000))),
                stop_price: None,
            })
            .unwrap();
        assert_eq!(report.status, OrderStatus::New);

        control.set_mark(&Symbol::new("BTCUSDT"), dec!(48900));
        assert_eq!(control.status_of(report.handle), Some(OrderStatus::Filled));
    }

    #[test]
    fn quantity_is_lot_aligned_before_submission() {
        let (_control, mut exec) = setup(dec!(50000));
        let report = exec
            .submit_order(&OrderConfig {
                symbol: Symbol::new("BTCUSDT"),
                side: Side::Sell,
                quantity: dec!(0.0105),
                price: None,
                stop_price: None,
            })
            .unwrap();
        // 0.0105 rounds down to the 0.001 lot step
        assert_eq!(report.executed_quantity, dec!(0.010));
    }
}
