use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};

use crate::{
    AmountInput, EngineError, Loadable, Money, ResultEngine, RunningBalance, Topic,
    running_balance,
    settings::{self, INITIAL_BALANCE_KEY},
};

use super::{Engine, with_tx};

impl Engine {
    /// The durable initial balance; zero when never set.
    pub async fn initial_balance(&self) -> ResultEngine<Money> {
        let Some(model) = settings::Entity::find_by_id(INITIAL_BALANCE_KEY.to_string())
            .one(&self.database)
            .await?
        else {
            return Ok(Money::ZERO);
        };
        model.value.parse::<i64>().map(Money::new).map_err(|_| {
            EngineError::Storage(format!("stored initial balance is corrupt: {}", model.value))
        })
    }

    pub async fn set_initial_balance(&self, amount: AmountInput) -> ResultEngine<Money> {
        let amount = self.parse_amount(&amount)?;

        with_tx!(self, |db_tx| {
            let active = settings::ActiveModel {
                key: ActiveValue::Set(INITIAL_BALANCE_KEY.to_string()),
                value: ActiveValue::Set(amount.minor().to_string()),
                updated_at: ActiveValue::Set(Utc::now()),
            };
            let exists = settings::Entity::find_by_id(INITIAL_BALANCE_KEY.to_string())
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                active.update(&db_tx).await?;
            } else {
                active.insert(&db_tx).await?;
            }
            Ok(())
        })?;

        self.events.publish(&[Topic::Balance]);
        Ok(amount)
    }

    /// Running balance per date group over the whole ledger.
    pub async fn balance_sheet(&self) -> ResultEngine<RunningBalance> {
        let initial: Loadable<Money> = self.initial_balance().await.into();
        let transactions = self.all_transactions().await?;
        running_balance(&transactions, &initial).require("initial balance")
    }

    /// Final balance of the ledger, `Pending` while the initial balance
    /// cannot be read.
    pub async fn current_final_balance(&self) -> ResultEngine<Loadable<Money>> {
        let initial: Loadable<Money> = self.initial_balance().await.into();
        let transactions = self.all_transactions().await?;
        Ok(running_balance(&transactions, &initial).map(|balance| balance.final_balance()))
    }
}
